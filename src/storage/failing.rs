//! [`KvStore`] wrapper that fails writes to selected keys on demand.

use super::{KvStore, MemoryKv, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct FailingKv {
    inner: MemoryKv,
    key_fragment: &'static str,
    armed: AtomicBool,
}

impl FailingKv {
    /// Writes to keys containing `key_fragment` fail while armed.
    pub(crate) fn new(inner: MemoryKv, key_fragment: &'static str) -> Self {
        Self {
            inner,
            key_fragment,
            armed: AtomicBool::new(false),
        }
    }

    pub(crate) fn arm(&self, on: bool) {
        self.armed.store(on, Ordering::SeqCst);
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.armed.load(Ordering::SeqCst) && key.contains(self.key_fragment) {
            return Err(StoreError::Backend(format!("write to {} refused", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FailingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set(key, value, ttl_secs).await
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.set_nx(key, value, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.inner.compare_and_delete(key, expected).await
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64, StoreError> {
        self.inner.incr_window(key, window_secs).await
    }
}
