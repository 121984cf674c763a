//! Content integrity: digests recorded on save and re-checked on view.

pub mod digest;
pub mod meta;
pub mod service;

use crate::storage::StoreError;

pub use service::{
    ContentDigestRecord, ContentIntegrityService, IntegritySnapshot, IntegrityStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("Failed to record digest for {content_id}: {source}")]
    DigestComputeFailure {
        content_id: String,
        source: StoreError,
    },

    #[error("Content store unavailable: {0}")]
    ContentStoreUnavailable(StoreError),

    #[error("{0}")]
    InvalidMeta(String),

    #[error(transparent)]
    Store(StoreError),
}

impl IntegrityError {
    /// A failed digest write. The save it belongs to must fail with it.
    pub(crate) fn persist(content_id: &str, err: StoreError) -> Self {
        if err.is_transient() {
            IntegrityError::ContentStoreUnavailable(err)
        } else {
            IntegrityError::DigestComputeFailure {
                content_id: content_id.to_string(),
                source: err,
            }
        }
    }

    pub(crate) fn from_store(err: StoreError) -> Self {
        if err.is_transient() {
            IntegrityError::ContentStoreUnavailable(err)
        } else {
            IntegrityError::Store(err)
        }
    }
}
