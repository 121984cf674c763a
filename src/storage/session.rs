//! Session storage.
//!
//! Key patterns:
//! - `session:{token}` — session data (JSON), expires with the session TTL
//!
//! Session JSON passes through `zeroize::Zeroizing` on read (see
//! [`super::get_json`]) so the bearer token does not linger in freed memory.
//! The backing store keeps its own copy; this only covers our process.

use super::{get_json, set_json, KvStore, StoreError};
use crate::models::StoredSession;

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

/// Store a session with TTL.
pub async fn store_session(
    kv: &dyn KvStore,
    session: &StoredSession,
    ttl_secs: u64,
) -> Result<(), StoreError> {
    set_json(kv, &session_key(&session.token), session, Some(ttl_secs)).await
}

/// Get a session by token.
pub async fn get_session(kv: &dyn KvStore, token: &str) -> Result<Option<StoredSession>, StoreError> {
    get_json(kv, &session_key(token)).await
}

/// Delete a session. Returns true if it existed.
pub async fn delete_session(kv: &dyn KvStore, token: &str) -> Result<bool, StoreError> {
    kv.delete(&session_key(token)).await
}
