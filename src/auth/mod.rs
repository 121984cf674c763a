//! Wallet sign-in: nonce issuance, challenge messages, signature recovery,
//! and session management.

pub mod address;
pub mod challenge;
pub mod manager;
pub mod middleware;
pub mod nonce;
pub mod session;
pub mod verify;

use crate::storage::StoreError;

pub use address::{Address, InvalidAddress};
pub use manager::{AuthPolicy, AuthSessionManager, IssuedSession, Registration, VerifyInput};
pub use middleware::{check_rate_limit, AppState, AuthSession};
pub use nonce::NonceStore;
pub use session::{generate_challenge_nonce, generate_session_token};
pub use verify::verify_signature;

/// Why a sign-in step failed.
///
/// The variants stay distinct for logging; at the HTTP boundary every gate
/// failure collapses to one of two 401 messages (see `error::AppError`).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid address")]
    InvalidAddress,

    #[error("Missing fields")]
    MissingFields,

    #[error("Rate limited")]
    RateLimited,

    #[error("Nonce mismatch or expired")]
    NonceMismatchOrExpired,

    #[error("Challenge message is missing: {}", .0.join(", "))]
    IncompleteMessage(Vec<&'static str>),

    #[error("Challenge message {0} does not match")]
    MessageFieldMismatch(&'static str),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Signature was not produced by the claimed address")]
    SignatureInvalid,

    #[error("Invalid session")]
    InvalidSession,

    #[error("{0}")]
    InvalidProfile(String),

    #[error("Identity store unavailable: {0}")]
    IdentityStoreUnavailable(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<InvalidAddress> for AuthError {
    fn from(_: InvalidAddress) -> Self {
        AuthError::InvalidAddress
    }
}

impl AuthError {
    /// Failures of the message/signature gates, reported as "Message mismatch".
    pub fn is_message_mismatch(&self) -> bool {
        matches!(
            self,
            AuthError::IncompleteMessage(_)
                | AuthError::MessageFieldMismatch(_)
                | AuthError::MalformedSignature(_)
                | AuthError::SignatureInvalid
        )
    }

    /// Wrap an identity-store failure, keeping transient ones retryable.
    pub(crate) fn identity_store(err: StoreError) -> Self {
        if err.is_transient() {
            AuthError::IdentityStoreUnavailable(err)
        } else {
            AuthError::Store(err)
        }
    }
}
