pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod integrity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod storage;

use auth::middleware::AppState;
use axum::Router;

/// Build the full application: API routes plus body limit, CORS, and
/// security headers.
pub fn app(state: AppState) -> Router {
    // Explicit CORS: deny all cross-origin requests (single-origin deployment).
    // CorsLayer::new() with no allowed origins rejects all CORS preflight requests.
    let cors = tower_http::cors::CorsLayer::new();

    routes::api_router()
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_body_bytes,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(state)
}
