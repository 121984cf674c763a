//! Post storage: the content store the integrity service reads and writes.
//!
//! Key patterns:
//! - `post:{nanoid}` — post data (JSON), no TTL
//! - `post_meta:{nanoid}:{key}` — one metadata value (STRING)
//! - `post_lock:{nanoid}` — save lock holder token, short TTL

use super::{get_json, set_json, KvStore, StoreError};
use crate::models::StoredPost;
use std::sync::Arc;

fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

fn meta_key(id: &str, key: &str) -> String {
    format!("post_meta:{}:{}", id, key)
}

fn lock_key(id: &str) -> String {
    format!("post_lock:{}", id)
}

#[derive(Clone)]
pub struct PostStore {
    kv: Arc<dyn KvStore>,
}

impl PostStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredPost>, StoreError> {
        get_json(self.kv.as_ref(), &post_key(id)).await
    }

    /// Insert or overwrite a post.
    pub async fn save(&self, post: &StoredPost) -> Result<(), StoreError> {
        set_json(self.kv.as_ref(), &post_key(&post.id), post, None).await
    }

    /// Read one metadata value. Empty strings count as absent.
    pub async fn get_meta(&self, id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.kv.get(&meta_key(id, key)).await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    pub async fn set_meta(&self, id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv.set(&meta_key(id, key), value, None).await
    }

    /// Take the save lock for a post. Returns the holder token, or None if
    /// another save holds it. The lock lapses after `ttl_secs`.
    pub async fn try_lock(&self, id: &str, ttl_secs: u64) -> Result<Option<String>, StoreError> {
        let token = nanoid::nanoid!();
        let acquired = self.kv.set_nx(&lock_key(id), &token, Some(ttl_secs)).await?;
        Ok(acquired.then_some(token))
    }

    /// Release a save lock, only if `token` still holds it.
    pub async fn unlock(&self, id: &str, token: &str) -> Result<bool, StoreError> {
        self.kv.compare_and_delete(&lock_key(id), token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostStatus;
    use crate::storage::MemoryKv;

    #[tokio::test]
    async fn test_save_and_get_post() {
        let store = PostStore::new(Arc::new(MemoryKv::new()));
        let post = StoredPost {
            id: "abc123def456".to_string(),
            title: "Hello".to_string(),
            content: "Hello".to_string(),
            status: PostStatus::Publish,
            author_id: "user1".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        store.save(&post).await.unwrap();

        let loaded = store.get("abc123def456").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Hello");
        assert_eq!(loaded.status, PostStatus::Publish);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_lock_is_exclusive() {
        let clock = Arc::new(crate::clock::ManualClock::new(0));
        let store = PostStore::new(Arc::new(MemoryKv::with_clock(clock.clone())));

        let token = store.try_lock("p1", 30).await.unwrap().unwrap();
        assert!(store.try_lock("p1", 30).await.unwrap().is_none());
        assert!(store.try_lock("p2", 30).await.unwrap().is_some());

        // A stale token cannot release someone else's lock
        assert!(!store.unlock("p1", "other").await.unwrap());
        assert!(store.unlock("p1", &token).await.unwrap());
        let second = store.try_lock("p1", 30).await.unwrap().unwrap();

        // Abandoned locks lapse
        clock.advance(30);
        assert!(store.try_lock("p1", 30).await.unwrap().is_some());
        assert!(!store.unlock("p1", &second).await.unwrap());
    }

    #[tokio::test]
    async fn test_meta_empty_is_absent() {
        let store = PostStore::new(Arc::new(MemoryKv::new()));
        store.set_meta("p1", "k", "").await.unwrap();
        assert!(store.get_meta("p1", "k").await.unwrap().is_none());

        store.set_meta("p1", "k", "v").await.unwrap();
        assert_eq!(store.get_meta("p1", "k").await.unwrap().as_deref(), Some("v"));
        assert!(store.get_meta("p2", "k").await.unwrap().is_none());
    }
}
