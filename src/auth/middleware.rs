//! Axum extractors for authentication and rate limiting.

use super::{AuthError, AuthPolicy, AuthSessionManager};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::AppError;
use crate::integrity::ContentIntegrityService;
use crate::storage::{KvStore, PostStore, StoreError};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
    pub auth: Arc<AuthSessionManager>,
    pub integrity: Arc<ContentIntegrityService>,
    pub posts: PostStore,
}

impl AppState {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let posts = PostStore::new(kv.clone());
        let auth = AuthSessionManager::new(
            kv.clone(),
            clock.clone(),
            AuthPolicy::from_config(&config),
        );
        let integrity = ContentIntegrityService::new(posts.clone(), config.store_timeout());
        Self {
            kv,
            clock,
            config: Arc::new(config),
            auth: Arc::new(auth),
            integrity: Arc::new(integrity),
            posts,
        }
    }
}

/// Authenticated session extractor.
///
/// Extracts session from `Authorization: Bearer {token}` header.
/// Returns 401 Unauthorized if missing or invalid.
pub struct AuthSession {
    pub user_id: String,
    pub address: String,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        // Parse Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?
            .trim()
            .to_string();

        let session = state.auth.authenticate(&token).await.map_err(|e| match e {
            AuthError::InvalidSession => {
                AppError::Unauthorized("Invalid or expired session".to_string())
            }
            other => AppError::from(other),
        })?;

        Ok(AuthSession {
            user_id: session.user_id,
            address: session.address,
            token,
        })
    }
}

/// Optional authenticated session extractor.
///
/// Returns Some(AuthSession) if valid auth header present, None otherwise.
/// Does not fail the request if auth is missing or invalid.
impl FromRequestParts<AppState> for Option<AuthSession> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AuthSession::from_request_parts(parts, state).await {
            Ok(session) => Ok(Some(session)),
            Err(_) => Ok(None),
        }
    }
}

/// Check a fixed-window rate limit.
///
/// # Arguments
/// * `kv` - Backing store
/// * `key` - Rate limit key (e.g., "ratelimit:auth:127.0.0.1")
/// * `max` - Maximum requests allowed in window
/// * `window_secs` - Time window in seconds
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit(
    kv: &dyn KvStore,
    key: &str,
    max: u32,
    window_secs: u64,
) -> Result<bool, StoreError> {
    let count = kv.incr_window(key, window_secs).await?;
    Ok(count <= u64::from(max))
}
