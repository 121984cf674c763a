//! Single-use, expiring sign-in nonces.
//!
//! Key patterns:
//! - `nonce:{address}` — live nonce record (JSON), TTL = nonce lifetime
//! - `nonce_rl:{address}` — issuance throttle marker, TTL = issue interval
//!
//! At most one nonce is live per address; issuing a new one replaces the old.
//! Consumption removes the record with a compare-and-delete on the exact
//! bytes that were read, so concurrent consumers of one nonce see exactly
//! one `true`.

use super::{generate_challenge_nonce, Address, AuthError};
use crate::clock::Clock;
use crate::models::StoredNonce;
use crate::storage::{KvStore, StoreError};
use std::sync::Arc;
use subtle::ConstantTimeEq;

fn nonce_key(address: &Address) -> String {
    format!("nonce:{}", address)
}

fn throttle_key(address: &Address) -> String {
    format!("nonce_rl:{}", address)
}

#[derive(Clone)]
pub struct NonceStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
    issue_interval_secs: u64,
}

impl NonceStore {
    pub fn new(
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        ttl_secs: u64,
        issue_interval_secs: u64,
    ) -> Self {
        Self {
            kv,
            clock,
            ttl_secs,
            issue_interval_secs,
        }
    }

    /// Issue a fresh nonce for `address`, replacing any live one.
    ///
    /// Fails with [`AuthError::RateLimited`] if a nonce was issued for the same
    /// address within the issue interval.
    pub async fn issue(&self, address: &Address) -> Result<String, AuthError> {
        if self.issue_interval_secs > 0 {
            let allowed = self
                .kv
                .set_nx(&throttle_key(address), "1", Some(self.issue_interval_secs))
                .await?;
            if !allowed {
                return Err(AuthError::RateLimited);
            }
        }

        let record = StoredNonce {
            address: address.to_string(),
            nonce: generate_challenge_nonce(),
            issued_at: self.clock.now_secs(),
        };
        let key = nonce_key(address);
        let written = match serde_json::to_string(&record) {
            Ok(json) => self.kv.set(&key, &json, Some(self.ttl_secs)).await,
            Err(e) => Err(StoreError::corrupt(&key, e)),
        };
        if let Err(e) = written {
            // Nothing was stored, so the address is not throttled
            if self.issue_interval_secs > 0 {
                let _ = self.kv.delete(&throttle_key(address)).await;
            }
            return Err(e.into());
        }

        tracing::debug!(action = "nonce_issued", address = %address.short(), "Nonce issued");
        Ok(record.nonce)
    }

    /// Atomically check and consume the live nonce for `address`.
    ///
    /// Returns true only if `nonce` equals the live nonce and it has not
    /// expired (a nonce is dead once its age reaches the TTL, the same
    /// instant the backing key expires); the record is removed in that case. A mismatching nonce leaves
    /// the live record in place. An expired record is removed and reported as
    /// false.
    pub async fn consume(&self, address: &Address, nonce: &str) -> Result<bool, StoreError> {
        let key = nonce_key(address);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(false);
        };

        let record: StoredNonce = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                self.kv.compare_and_delete(&key, &raw).await?;
                return Err(StoreError::corrupt(&key, e));
            }
        };

        let matches: bool = record.nonce.as_bytes().ct_eq(nonce.as_bytes()).into();
        if !matches || record.address != address.as_str() {
            return Ok(false);
        }

        let age = self.clock.now_secs().saturating_sub(record.issued_at);
        if age >= self.ttl_secs {
            self.kv.compare_and_delete(&key, &raw).await?;
            return Ok(false);
        }

        self.kv.compare_and_delete(&key, &raw).await
    }
}
