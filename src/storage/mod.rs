//! Key-value storage layer for nonces, sessions, identities, and posts.
//!
//! Everything is written against [`KvStore`], a small TTL-aware string store.
//! Production runs on Redis ([`redis_kv::RedisKv`]); tests and single-process
//! deployments use [`memory::MemoryKv`]. Records are serialized to JSON.

#[cfg(test)]
mod failing;
pub mod identity;
pub mod memory;
pub mod post;
pub mod redis_kv;
pub mod session;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[cfg(test)]
pub(crate) use failing::FailingKv;
pub use identity::IdentityStore;
pub use memory::MemoryKv;
pub use post::PostStore;
pub use redis_kv::RedisKv;

/// Pause before the single retry of a failed external-store call.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage call timed out")]
    Timeout,

    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_) | StoreError::Timeout)
    }

    pub(crate) fn corrupt(key: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// TTL-aware string store.
///
/// Implementations must make `set_nx` and `compare_and_delete` atomic with
/// respect to every other operation on the same key.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value. `ttl_secs = None` keeps it until deleted.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;

    /// Store only if the key is absent. Returns true if the value was written.
    async fn set_nx(&self, key: &str, value: &str, ttl_secs: Option<u64>)
        -> Result<bool, StoreError>;

    /// Returns true if a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete `key` only if its current value is exactly `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Increment a fixed-window counter, starting the window on first use.
    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64, StoreError>;
}

/// Fetch and deserialize a JSON record.
pub(crate) async fn get_json<T>(kv: &dyn KvStore, key: &str) -> Result<Option<T>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    match kv.get(key).await? {
        Some(data) => {
            let data = zeroize::Zeroizing::new(data);
            serde_json::from_str(&data)
                .map(Some)
                .map_err(|e| StoreError::corrupt(key, e))
        }
        None => Ok(None),
    }
}

/// Serialize and store a JSON record.
pub(crate) async fn set_json<T>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
    ttl_secs: Option<u64>,
) -> Result<(), StoreError>
where
    T: serde::Serialize,
{
    let json = serde_json::to_string(value).map_err(|e| StoreError::corrupt(key, e))?;
    kv.set(key, &json, ttl_secs).await
}

/// Run an external-store call under a timeout, retrying once on a transient
/// failure.
pub async fn with_retry<T, F, Fut>(timeout: Duration, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let first = match tokio::time::timeout(timeout, op()).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    };

    match first {
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, "Store call failed, retrying once");
        }
        other => return other,
    }

    tokio::time::sleep(RETRY_BACKOFF).await;

    match tokio::time::timeout(timeout, op()).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_with_retry_recovers_after_one_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(Duration::from_secs(1), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::Backend("connection reset".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_second_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(Duration::from_secs(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("down".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_corrupt_records() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(Duration::from_secs(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::corrupt("k", "bad json"))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_times_out() {
        let result: Result<(), _> = with_retry(Duration::from_millis(50), || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout)));
    }
}
