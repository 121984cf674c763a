//! Compute, store, and re-verify content digests.

use super::digest::{self, ContentDigest};
use super::meta::{self, CONTRACT_TX, IPFS_CID, KECCAK256, ON_CHAIN, SHA256};
use super::IntegrityError;
use crate::models::{IntegrityMeta, IntegrityMetaUpdate};
use crate::storage::{with_retry, PostStore, StoreError};
use std::time::Duration;

/// Minimum length of an IPFS CID.
const MIN_CID_LEN: usize = 10;

/// Maximum length of an anchoring transaction id.
const MAX_CONTRACT_TX_LEN: usize = 128;

/// Digest state persisted for one content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigestRecord {
    pub content_id: String,
    pub sha256_hex: String,
    pub derived_hex: String,
    pub on_chain_verified: bool,
}

/// Result of re-checking content against its stored digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrityStatus {
    /// The content hashes to the stored SHA-256.
    pub verified: bool,
    /// The on-chain flag, read independently of `verified`.
    pub on_chain: bool,
}

/// Everything a post view needs from the integrity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegritySnapshot {
    pub status: IntegrityStatus,
    pub keccak256: String,
    pub meta: IntegrityMeta,
}

fn is_valid_cid(cid: &str) -> bool {
    cid.len() >= MIN_CID_LEN
        && cid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '=' | '/' | '_' | '-'))
}

fn is_valid_contract_tx(tx: &str) -> bool {
    !tx.is_empty() && tx.len() <= MAX_CONTRACT_TX_LEN && tx.chars().all(|c| c.is_ascii_graphic())
}

#[derive(Clone)]
pub struct ContentIntegrityService {
    posts: PostStore,
    store_timeout: Duration,
}

impl ContentIntegrityService {
    pub fn new(posts: PostStore, store_timeout: Duration) -> Self {
        Self {
            posts,
            store_timeout,
        }
    }

    async fn read_field(
        &self,
        content_id: &str,
        field: &meta::MetaField,
    ) -> Result<Option<String>, IntegrityError> {
        with_retry(self.store_timeout, || meta::read(&self.posts, content_id, field))
            .await
            .map_err(IntegrityError::from_store)
    }

    async fn write_field(
        &self,
        content_id: &str,
        field: &meta::MetaField,
        value: &str,
    ) -> Result<(), StoreError> {
        with_retry(self.store_timeout, || meta::write(&self.posts, content_id, field, value)).await
    }

    async fn persist_digest(
        &self,
        content_id: &str,
        digest: &ContentDigest,
    ) -> Result<(), StoreError> {
        // Flag first: a partial write must never pair a new digest with an old anchor
        self.write_field(content_id, &ON_CHAIN, meta::flag_value(false)).await?;
        self.write_field(content_id, &SHA256, &digest.sha256_hex).await?;
        self.write_field(content_id, &KECCAK256, &digest.derived_hex).await
    }

    /// Compute and persist digests for freshly saved content.
    ///
    /// Any earlier on-chain flag is cleared: the anchored digest no longer
    /// describes this content.
    pub async fn on_save(
        &self,
        content_id: &str,
        raw: &str,
    ) -> Result<ContentDigestRecord, IntegrityError> {
        let digest = digest::compute(raw.as_bytes());

        self.persist_digest(content_id, &digest)
            .await
            .map_err(|e| IntegrityError::persist(content_id, e))?;

        tracing::info!(
            action = "digest_saved",
            content_id = %content_id,
            sha256 = %digest.sha256_hex,
            "Content digest saved"
        );

        Ok(ContentDigestRecord {
            content_id: content_id.to_string(),
            sha256_hex: digest.sha256_hex,
            derived_hex: digest.derived_hex,
            on_chain_verified: false,
        })
    }

    /// Integrity state for rendering `raw`: every field is read once.
    pub async fn snapshot(
        &self,
        content_id: &str,
        raw: &str,
    ) -> Result<IntegritySnapshot, IntegrityError> {
        let sha256 = self.read_field(content_id, &SHA256).await?;
        let keccak256 = self.read_field(content_id, &KECCAK256).await?;
        let on_chain = self.read_field(content_id, &ON_CHAIN).await?;
        let ipfs_cid = self.read_field(content_id, &IPFS_CID).await?;
        let contract_tx = self.read_field(content_id, &CONTRACT_TX).await?;

        let status = IntegrityStatus {
            verified: self.matches_stored(content_id, sha256.as_deref(), raw),
            on_chain: meta::parse_flag(on_chain.as_deref()),
        };
        Ok(IntegritySnapshot {
            status,
            keccak256: keccak256.unwrap_or_default(),
            meta: IntegrityMeta {
                sha256: sha256.unwrap_or_default(),
                ipfs_cid: ipfs_cid.unwrap_or_default(),
                verified: status.on_chain,
                contract_tx: contract_tx.unwrap_or_default(),
            },
        })
    }

    fn matches_stored(&self, content_id: &str, stored: Option<&str>, raw: &str) -> bool {
        let Some(stored) = stored else {
            return false;
        };
        let current = digest::sha256_hex(raw.as_bytes());
        let matches = digest::digests_match(stored, &current);
        if !matches {
            tracing::info!(
                action = "digest_mismatch",
                content_id = %content_id,
                "Content does not match its stored digest"
            );
        }
        matches
    }

    /// Re-hash `raw` and compare with the stored digest.
    ///
    /// A mismatch or a missing digest yields `verified: false`, never an error.
    pub async fn verify_on_view(
        &self,
        content_id: &str,
        raw: &str,
    ) -> Result<IntegrityStatus, IntegrityError> {
        let stored = self.read_field(content_id, &SHA256).await?;
        let on_chain = self.read_field(content_id, &ON_CHAIN).await?;

        Ok(IntegrityStatus {
            verified: self.matches_stored(content_id, stored.as_deref(), raw),
            on_chain: meta::parse_flag(on_chain.as_deref()),
        })
    }

    /// Record that the current digest has been anchored. Idempotent.
    pub async fn mark_on_chain_verified(&self, content_id: &str) -> Result<(), IntegrityError> {
        self.set_on_chain(content_id, true).await
    }

    async fn set_on_chain(&self, content_id: &str, on: bool) -> Result<(), IntegrityError> {
        self.write_field(content_id, &ON_CHAIN, meta::flag_value(on))
            .await
            .map_err(IntegrityError::from_store)?;
        tracing::info!(
            action = "on_chain_flag",
            content_id = %content_id,
            on_chain = on,
            "On-chain flag updated"
        );
        Ok(())
    }

    /// The stored digest record, if the content has ever been hashed.
    pub async fn record(
        &self,
        content_id: &str,
    ) -> Result<Option<ContentDigestRecord>, IntegrityError> {
        let Some(sha256_hex) = self.read_field(content_id, &SHA256).await? else {
            return Ok(None);
        };
        let derived_hex = self
            .read_field(content_id, &KECCAK256)
            .await?
            .unwrap_or_default();
        let on_chain = self.read_field(content_id, &ON_CHAIN).await?;

        Ok(Some(ContentDigestRecord {
            content_id: content_id.to_string(),
            sha256_hex,
            derived_hex,
            on_chain_verified: meta::parse_flag(on_chain.as_deref()),
        }))
    }

    /// Integrity metadata as exposed to clients.
    pub async fn integrity_meta(&self, content_id: &str) -> Result<IntegrityMeta, IntegrityError> {
        let sha256 = self.read_field(content_id, &SHA256).await?;
        let ipfs_cid = self.read_field(content_id, &IPFS_CID).await?;
        let on_chain = self.read_field(content_id, &ON_CHAIN).await?;
        let contract_tx = self.read_field(content_id, &CONTRACT_TX).await?;

        Ok(IntegrityMeta {
            sha256: sha256.unwrap_or_default(),
            ipfs_cid: ipfs_cid.unwrap_or_default(),
            verified: meta::parse_flag(on_chain.as_deref()),
            contract_tx: contract_tx.unwrap_or_default(),
        })
    }

    /// Apply a metadata update and return the resulting state.
    ///
    /// All fields are validated before anything is written.
    pub async fn update_integrity_meta(
        &self,
        content_id: &str,
        update: IntegrityMetaUpdate,
    ) -> Result<IntegrityMeta, IntegrityError> {
        let cid = update.ipfs_cid.as_deref().map(str::trim);
        if let Some(cid) = cid {
            if !is_valid_cid(cid) {
                return Err(IntegrityError::InvalidMeta(
                    "Invalid IPFS CID format".to_string(),
                ));
            }
        }
        let contract_tx = update.contract_tx.as_deref().map(str::trim);
        if let Some(tx) = contract_tx {
            if !is_valid_contract_tx(tx) {
                return Err(IntegrityError::InvalidMeta(
                    "Invalid contract transaction id".to_string(),
                ));
            }
        }

        if let Some(cid) = cid {
            self.write_field(content_id, &IPFS_CID, cid)
                .await
                .map_err(IntegrityError::from_store)?;
        }
        if let Some(tx) = contract_tx {
            self.write_field(content_id, &CONTRACT_TX, tx)
                .await
                .map_err(IntegrityError::from_store)?;
        }
        match update.verified {
            Some(true) => self.mark_on_chain_verified(content_id).await?,
            Some(false) => self.set_on_chain(content_id, false).await?,
            None => {}
        }

        self.integrity_meta(content_id).await
    }
}
