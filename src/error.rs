//! Error types and Axum response conversions.

use crate::auth::AuthError;
use crate::integrity::IntegrityError;
use crate::storage::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Public message for nonce failures.
pub const NONCE_MISMATCH: &str = "Nonce mismatch or expired";
/// Public message for every challenge-message and signature failure.
pub const MESSAGE_MISMATCH: &str = "Message mismatch";

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Backing store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            AppError::Unavailable(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidAddress => AppError::BadRequest("Invalid address".to_string()),
            AuthError::MissingFields => AppError::BadRequest("Missing fields".to_string()),
            AuthError::InvalidProfile(msg) => AppError::BadRequest(msg),
            AuthError::RateLimited => AppError::RateLimited,
            AuthError::NonceMismatchOrExpired => AppError::Unauthorized(NONCE_MISMATCH.to_string()),
            e if e.is_message_mismatch() => AppError::Unauthorized(MESSAGE_MISMATCH.to_string()),
            AuthError::InvalidSession => AppError::Unauthorized("Invalid session".to_string()),
            AuthError::IdentityStoreUnavailable(e) => AppError::Unavailable(e.to_string()),
            AuthError::Store(e) => AppError::from(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<IntegrityError> for AppError {
    fn from(err: IntegrityError) -> Self {
        match err {
            IntegrityError::InvalidMeta(msg) => AppError::BadRequest(msg),
            IntegrityError::ContentStoreUnavailable(e) => AppError::Unavailable(e.to_string()),
            IntegrityError::Store(e) => AppError::from(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    /// Extract status code and JSON body from an AppError response.
    async fn error_response(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        // CRITICAL: Internal error must NOT leak detailed message to client
        let (status, body) = error_response(AppError::Internal(
            "Redis connection refused at 10.0.0.5:6379".to_string(),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().contains("Redis"));
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_unavailable_hides_details() {
        let (status, body) =
            error_response(AppError::Unavailable("timeout at 10.0.0.5".to_string())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_bad_request() {
        let (status, body) =
            error_response(AppError::BadRequest("Invalid format".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid format");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (status, body) =
            error_response(AppError::Unauthorized("Authentication failed".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication failed");
    }

    #[tokio::test]
    async fn test_forbidden() {
        let (status, body) =
            error_response(AppError::Forbidden("Not the author".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Not the author");
    }

    #[tokio::test]
    async fn test_not_found() {
        let (status, body) = error_response(AppError::NotFound("Post not found".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Post not found");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let (status, body) = error_response(AppError::RateLimited).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded");
    }

    #[test]
    fn test_auth_gate_failures_collapse_to_two_messages() {
        let message_failures = vec![
            AuthError::IncompleteMessage(vec!["nonce"]),
            AuthError::MessageFieldMismatch("domain"),
            AuthError::MalformedSignature("Invalid hex".to_string()),
            AuthError::SignatureInvalid,
        ];
        for err in message_failures {
            match AppError::from(err) {
                AppError::Unauthorized(msg) => assert_eq!(msg, MESSAGE_MISMATCH),
                other => panic!("expected 401, got {:?}", other),
            }
        }

        match AppError::from(AuthError::NonceMismatchOrExpired) {
            AppError::Unauthorized(msg) => assert_eq!(msg, NONCE_MISMATCH),
            other => panic!("expected 401, got {:?}", other),
        }
    }

    #[test]
    fn test_from_auth_error() {
        assert!(matches!(
            AppError::from(AuthError::MissingFields),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(AuthError::RateLimited),
            AppError::RateLimited
        ));
        assert!(matches!(
            AppError::from(AuthError::IdentityStoreUnavailable(StoreError::Timeout)),
            AppError::Unavailable(_)
        ));
        assert!(matches!(
            AppError::from(AuthError::Store(StoreError::corrupt("k", "bad"))),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_from_integrity_error() {
        assert!(matches!(
            AppError::from(IntegrityError::InvalidMeta("Invalid IPFS CID format".to_string())),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(IntegrityError::ContentStoreUnavailable(StoreError::Timeout)),
            AppError::Unavailable(_)
        ));
        assert!(matches!(
            AppError::from(IntegrityError::persist("p1", StoreError::corrupt("k", "bad"))),
            AppError::Internal(_)
        ));
    }
}
