//! In-process [`KvStore`] with lazy TTL expiry.
//!
//! A single mutex guards the map, which makes every operation (including
//! compare-and-delete) atomic. Expired entries are dropped when touched.

use super::{KvStore, StoreError};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    value: String,
    expires_at: Option<u64>,
}

pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn expiry(&self, ttl_secs: Option<u64>) -> Option<u64> {
        ttl_secs.map(|ttl| self.clock.now_secs().saturating_add(ttl))
    }

    /// Drop `key` if its TTL has passed, returning the live entry otherwise.
    fn live<'a>(&self, entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = self.clock.now_secs();
        let expired = match entries.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|at| at <= now),
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock();
        Ok(self.live(&mut entries, key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let expires_at = self.expiry(ttl_secs);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError> {
        let expires_at = self.expiry(ttl_secs);
        let mut entries = self.entries.lock();
        if self.live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let existed = self.live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let matches = self
            .live(&mut entries, key)
            .is_some_and(|e| e.value == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64, StoreError> {
        let expires_at = self.expiry(Some(window_secs));
        let mut entries = self.entries.lock();
        let count = match self.live(&mut entries, key) {
            Some(entry) => {
                let count = entry
                    .value
                    .parse::<u64>()
                    .map_err(|e| StoreError::corrupt(key, e))?
                    + 1;
                entry.value = count.to_string();
                count
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at,
                    },
                );
                1
            }
        };
        Ok(count)
    }
}
