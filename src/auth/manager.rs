//! Wallet sign-in flow: challenge issuance, verification gates, sessions.
//!
//! Per address the flow moves `NoChallenge -> ChallengeIssued -> Verified`,
//! or back to `NoChallenge` when a nonce expires or is consumed by a failed
//! attempt. Verification runs its gates in a fixed order and stops at the
//! first failure:
//!
//! 1. consume the nonce (single use, even if a later gate fails)
//! 2. parse all four challenge fields
//! 3. compare the fields with the service domain and the request
//! 4. recover the signer and compare with the claimed address
//! 5. resolve the identity and issue a session

use super::challenge;
use super::session::generate_session_token;
use super::verify::verify_signature;
use super::{Address, AuthError, NonceStore};
use crate::clock::Clock;
use crate::config::Config;
use crate::models::{StoredIdentity, StoredSession};
use crate::storage::identity::ProfileUpdate;
use crate::storage::session::{delete_session, get_session, store_session};
use crate::storage::{with_retry, IdentityStore, KvStore};
use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::Argon2;
use std::sync::Arc;
use std::time::Duration;

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 64;

/// Sign-in settings.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    /// Normalized host the challenge must name.
    pub domain: String,
    pub nonce_ttl_secs: u64,
    pub nonce_issue_interval_secs: u64,
    pub session_ttl_secs: u64,
    pub store_timeout: Duration,
}

impl AuthPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            domain: config.service_domain.clone(),
            nonce_ttl_secs: config.nonce_ttl_secs,
            nonce_issue_interval_secs: config.nonce_issue_interval_secs,
            session_ttl_secs: config.session_ttl_secs,
            store_timeout: config.store_timeout(),
        }
    }
}

/// Fields of a verification request, as received.
#[derive(Debug, Clone, Copy)]
pub struct VerifyInput<'a> {
    pub address: &'a str,
    pub signature: &'a str,
    pub nonce: &'a str,
    pub chain_id: Option<u64>,
    pub message: &'a str,
}

/// A session handed out after successful verification.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: String,
    pub address: Address,
}

/// Profile fields submitted at registration.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.contains(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
}

pub struct AuthSessionManager {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    nonces: NonceStore,
    identities: IdentityStore,
    policy: AuthPolicy,
}

impl AuthSessionManager {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, policy: AuthPolicy) -> Self {
        let nonces = NonceStore::new(
            kv.clone(),
            clock.clone(),
            policy.nonce_ttl_secs,
            policy.nonce_issue_interval_secs,
        );
        let identities = IdentityStore::new(kv.clone());
        Self {
            kv,
            clock,
            nonces,
            identities,
            policy,
        }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Validate the address and issue a nonce for it.
    pub async fn request_challenge(&self, raw_address: &str) -> Result<String, AuthError> {
        let address = Address::parse(raw_address)?;
        let nonce = self.nonces.issue(&address).await?;
        tracing::info!(action = "nonce_issued", address = %address.short(), "Sign-in nonce issued");
        Ok(nonce)
    }

    /// Run the verification gates and issue a session.
    pub async fn verify(&self, input: VerifyInput<'_>) -> Result<IssuedSession, AuthError> {
        if input.address.trim().is_empty()
            || input.signature.trim().is_empty()
            || input.nonce.trim().is_empty()
            || input.message.trim().is_empty()
            || input.chain_id.is_none()
        {
            return Err(AuthError::MissingFields);
        }
        let address = Address::parse(input.address)?;

        match self.run_gates(&address, &input).await {
            Ok(session) => {
                tracing::info!(
                    action = "auth_success",
                    address = %address.short(),
                    user_id = %session.user_id,
                    "Wallet authenticated"
                );
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(
                    action = "auth_failed",
                    address = %address.short(),
                    reason = %e,
                    "Wallet authentication failed"
                );
                Err(e)
            }
        }
    }

    async fn run_gates(
        &self,
        address: &Address,
        input: &VerifyInput<'_>,
    ) -> Result<IssuedSession, AuthError> {
        let nonce = input.nonce.trim();

        // Gate 1: the nonce is spent from here on, whatever happens next
        if !self.nonces.consume(address, nonce).await? {
            return Err(AuthError::NonceMismatchOrExpired);
        }

        // Gate 2
        let fields = challenge::parse(input.message)
            .complete()
            .map_err(AuthError::IncompleteMessage)?;

        // Gate 3
        if fields.domain != self.policy.domain {
            return Err(AuthError::MessageFieldMismatch("domain"));
        }
        if &fields.address != address {
            return Err(AuthError::MessageFieldMismatch("address"));
        }
        if Some(fields.chain_id) != input.chain_id {
            return Err(AuthError::MessageFieldMismatch("chain_id"));
        }
        if fields.nonce != nonce {
            return Err(AuthError::MessageFieldMismatch("nonce"));
        }

        // Gate 4
        if !verify_signature(input.message.as_bytes(), input.signature, address)? {
            return Err(AuthError::SignatureInvalid);
        }

        // Gate 5
        let now = self.clock.now_secs();
        let identity = with_retry(self.policy.store_timeout, || {
            self.identities.find_or_create(address, now)
        })
        .await
        .map_err(AuthError::identity_store)?;

        let session = StoredSession {
            token: generate_session_token(),
            user_id: identity.id.clone(),
            address: address.to_string(),
            created_at: now,
        };
        store_session(self.kv.as_ref(), &session, self.policy.session_ttl_secs).await?;

        Ok(IssuedSession {
            token: session.token,
            user_id: identity.id,
            address: address.clone(),
        })
    }

    /// Resolve a bearer token to its live session.
    pub async fn authenticate(&self, token: &str) -> Result<StoredSession, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidSession);
        }
        get_session(self.kv.as_ref(), token)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// Resolve a token and require that it belongs to `address`.
    async fn session_for(&self, address: &Address, token: &str) -> Result<StoredSession, AuthError> {
        let session = self.authenticate(token.trim()).await?;
        if session.address != address.as_str() {
            return Err(AuthError::InvalidSession);
        }
        Ok(session)
    }

    /// Attach profile fields to the identity of a signed-in wallet.
    ///
    /// Requires a live session for `address`; the wallet signature is not
    /// checked again.
    pub async fn register(
        &self,
        raw_address: &str,
        token: &str,
        registration: Registration,
    ) -> Result<StoredIdentity, AuthError> {
        let address = Address::parse(raw_address)?;
        self.session_for(&address, token).await?;

        let email = registration.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidProfile("Valid email required".to_string()));
        }
        if registration.password.is_empty() {
            return Err(AuthError::InvalidProfile("Password required".to_string()));
        }

        let name = registration.name.trim();
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::InvalidProfile(format!(
                "Name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        let display_name = if name.is_empty() {
            format!("user_{}", address.short())
        } else {
            name.to_string()
        };

        let profile = ProfileUpdate {
            display_name,
            email,
            password_hash: hash_password(&registration.password)?,
        };

        let now = self.clock.now_secs();
        let identity = with_retry(self.policy.store_timeout, || {
            self.identities.find_or_create(&address, now)
        })
        .await
        .map_err(AuthError::identity_store)?;

        let updated = with_retry(self.policy.store_timeout, || {
            self.identities.update_profile(&identity, profile.clone())
        })
        .await
        .map_err(AuthError::identity_store)?;

        tracing::info!(
            action = "user_registered",
            user_id = %updated.id,
            address = %address.short(),
            "Wallet profile registered"
        );
        Ok(updated)
    }

    /// Identity bound to a signed-in wallet, if one exists.
    pub async fn profile(
        &self,
        raw_address: &str,
        token: &str,
    ) -> Result<Option<StoredIdentity>, AuthError> {
        let address = Address::parse(raw_address)?;
        self.session_for(&address, token).await?;

        with_retry(self.policy.store_timeout, || {
            self.identities.find_by_address(&address)
        })
        .await
        .map_err(AuthError::identity_store)
    }

    /// Delete a session. Returns true if it existed.
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        Ok(delete_session(self.kv.as_ref(), token).await?)
    }
}
