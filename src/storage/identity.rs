//! Identity storage: wallet-bound user accounts.
//!
//! Key patterns:
//! - `identity:{nanoid}` — identity data (JSON), no TTL
//! - `wallet:{address}` — address lookup to identity id (STRING)
//!
//! The auth core only looks identities up and creates them; profile fields
//! are updated by registration. Nothing here deletes.

use super::{get_json, set_json, KvStore, StoreError};
use crate::auth::Address;
use crate::models::StoredIdentity;
use std::sync::Arc;

/// Role given to identities created by wallet sign-in.
pub const DEFAULT_ROLE: &str = "subscriber";

fn identity_key(id: &str) -> String {
    format!("identity:{}", id)
}

fn wallet_key(address: &Address) -> String {
    format!("wallet:{}", address)
}

/// Profile fields set during registration.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Clone)]
pub struct IdentityStore {
    kv: Arc<dyn KvStore>,
}

impl IdentityStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredIdentity>, StoreError> {
        get_json(self.kv.as_ref(), &identity_key(id)).await
    }

    /// Two-step lookup: address -> identity id -> identity data.
    pub async fn find_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<StoredIdentity>, StoreError> {
        let id = self.kv.get(&wallet_key(address)).await?;
        match id {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    /// Return the identity bound to `address`, creating it on first sign-in.
    ///
    /// The address claim uses set-if-absent, so two concurrent first sign-ins
    /// for one wallet end up on the same identity.
    pub async fn find_or_create(
        &self,
        address: &Address,
        now: u64,
    ) -> Result<StoredIdentity, StoreError> {
        if let Some(existing) = self.find_by_address(address).await? {
            return Ok(existing);
        }

        let identity = StoredIdentity {
            id: nanoid::nanoid!(12),
            address: address.to_string(),
            display_name: format!("user_{}", address.short()),
            email: None,
            password_hash: None,
            role: DEFAULT_ROLE.to_string(),
            profile_set: false,
            created_at: now,
        };

        // Write the record before claiming the address so a lookup never
        // resolves to a missing identity.
        set_json(self.kv.as_ref(), &identity_key(&identity.id), &identity, None).await?;

        let claimed = self
            .kv
            .set_nx(&wallet_key(address), &identity.id, None)
            .await?;
        if claimed {
            tracing::info!(action = "identity_created", user_id = %identity.id, address = %address, "Identity created for wallet");
            return Ok(identity);
        }

        // Lost the race; discard ours and use the winner.
        self.kv.delete(&identity_key(&identity.id)).await?;
        self.find_by_address(address)
            .await?
            .ok_or_else(|| StoreError::corrupt(&wallet_key(address), "dangling wallet lookup"))
    }

    /// Apply registration profile fields.
    pub async fn update_profile(
        &self,
        identity: &StoredIdentity,
        profile: ProfileUpdate,
    ) -> Result<StoredIdentity, StoreError> {
        let updated = StoredIdentity {
            display_name: profile.display_name,
            email: Some(profile.email),
            password_hash: Some(profile.password_hash),
            profile_set: true,
            ..identity.clone()
        };
        set_json(self.kv.as_ref(), &identity_key(&updated.id), &updated, None).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;

    fn addr() -> Address {
        Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap()
    }

    #[tokio::test]
    async fn test_find_or_create_is_stable() {
        let store = IdentityStore::new(Arc::new(MemoryKv::new()));

        let first = store.find_or_create(&addr(), 10).await.unwrap();
        assert_eq!(first.address, addr().as_str());
        assert_eq!(first.role, DEFAULT_ROLE);
        assert_eq!(first.display_name, "user_abcdef");

        let second = store.find_or_create(&addr(), 20).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, 10);
    }

    #[tokio::test]
    async fn test_find_by_address_unknown() {
        let store = IdentityStore::new(Arc::new(MemoryKv::new()));
        assert!(store.find_by_address(&addr()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = IdentityStore::new(Arc::new(MemoryKv::new()));
        let identity = store.find_or_create(&addr(), 10).await.unwrap();

        let updated = store
            .update_profile(
                &identity,
                ProfileUpdate {
                    display_name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    password_hash: "$argon2id$stub".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(updated.profile_set);

        let reloaded = store.find_by_address(&addr()).await.unwrap().unwrap();
        assert_eq!(reloaded.display_name, "Ada");
        assert_eq!(reloaded.email.as_deref(), Some("ada@example.com"));
        assert_eq!(reloaded.id, identity.id);
    }
}
