//! Auth API endpoints.

use super::limit_auth_by_ip;
use crate::auth::middleware::{AppState, AuthSession};
use crate::auth::{AuthError, Registration, VerifyInput};
use crate::error::AppError;
use crate::models::{
    NonceRequest, NonceResponse, ProfileRequest, ProfileResponse, RegisterRequest,
    RegisterResponse, VerifyRequest, VerifyResponse,
};
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

/// POST /auth/nonce — Issue a sign-in nonce for an address
pub async fn request_nonce(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<NonceRequest>,
) -> Result<impl IntoResponse, AppError> {
    limit_auth_by_ip(&state, addr.ip(), "auth/nonce").await?;

    let nonce = state
        .auth
        .request_challenge(&req.address)
        .await
        .map_err(|e| {
            if matches!(e, AuthError::RateLimited) {
                tracing::warn!(action = "rate_limited", endpoint = "auth/nonce", "Nonce requested within issue interval");
            }
            AppError::from(e)
        })?;

    Ok(Json(NonceResponse {
        success: true,
        nonce,
    }))
}

/// POST /auth/verify — Verify a signed challenge and create a session
pub async fn verify(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    limit_auth_by_ip(&state, addr.ip(), "auth/verify").await?;

    let issued = state
        .auth
        .verify(VerifyInput {
            address: &req.address,
            signature: &req.signature,
            nonce: &req.nonce,
            chain_id: req.chain_id,
            message: &req.message,
        })
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        token: issued.token,
        user_id: issued.user_id,
    }))
}

/// POST /user/register — Attach profile fields to a signed-in wallet
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    limit_auth_by_ip(&state, addr.ip(), "user/register").await?;

    let identity = state
        .auth
        .register(
            &req.address,
            &req.token,
            Registration {
                name: req.name,
                email: req.email,
                password: req.password,
            },
        )
        .await?;

    Ok(Json(RegisterResponse {
        success: true,
        user_id: identity.id,
        redirect: state.config.dashboard_path.clone(),
    }))
}

/// POST /user/profile — Whether a signed-in wallet has an identity
pub async fn profile(
    State(state): State<AppState>,
    Json(req): Json<ProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.auth.profile(&req.address, &req.token).await?;

    Ok(Json(ProfileResponse {
        success: true,
        exists: identity.is_some(),
        name: identity.map(|i| i.display_name),
    }))
}

/// POST /auth/logout — Invalidate current session
pub async fn logout(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(&session.token).await?;

    tracing::info!(action = "logout", user_id = %session.user_id, "User logged out");

    Ok(StatusCode::NO_CONTENT)
}
