//! API route handlers.

pub mod auth;
pub mod posts;

use crate::auth::middleware::{check_rate_limit, AppState};
use crate::error::AppError;
use axum::{routing::get, routing::post, Router};
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// Length of generated post ids.
pub const POST_ID_LEN: usize = 12;

/// Validate that a string is a valid nanoid (alphanumeric, hyphens, underscores).
pub fn validate_id(id: &str, label: &str, expected_len: usize) -> Result<(), AppError> {
    if id.len() != expected_len
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(format!("Invalid {} format", label)));
    }
    Ok(())
}

/// Hash a client IP for logging.
pub(crate) fn ip_hash(ip: IpAddr) -> String {
    let mut hasher = std::hash::DefaultHasher::new();
    ip.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Per-IP limit shared by the auth endpoints.
pub(crate) async fn limit_auth_by_ip(
    state: &AppState,
    ip: IpAddr,
    endpoint: &'static str,
) -> Result<(), AppError> {
    let key = format!("ratelimit:auth:{}", ip);
    let allowed = check_rate_limit(
        state.kv.as_ref(),
        &key,
        state.config.rate_limit_auth_per_min,
        60,
    )
    .await?;

    if !allowed {
        tracing::warn!(action = "rate_limited", endpoint = endpoint, ip_hash = %ip_hash(ip), "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(())
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/auth/nonce", post(auth::request_nonce))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/logout", post(auth::logout))
        .route("/user/register", post(auth::register))
        .route("/user/profile", post(auth::profile))
        // Post endpoints
        .route("/posts", post(posts::save_post))
        .route("/posts/{id}", get(posts::get_post))
        .route(
            "/posts/{id}/meta",
            get(posts::get_meta).post(posts::update_meta),
        )
}
