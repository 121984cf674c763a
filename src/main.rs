//! Sealpost application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Build router with API routes
//! 4. Apply body limit, CORS, and security headers
//! 5. Start Axum server
//!
//! Also supports a `digest` subcommand that prints the digests the service
//! would record for a file, for comparing against an anchored value.

use sealpost::{
    auth::middleware::AppState, clock::SystemClock, config::Config, integrity::digest,
    storage::RedisKv,
};
use std::net::SocketAddr;
use std::sync::Arc;

fn print_digest_usage() {
    eprintln!("Usage: sealpost digest <file>");
    eprintln!();
    eprintln!("Print the SHA-256 and derived Keccak-256 recorded for content.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  sealpost digest post.md");
}

fn run_digest(path: &str) -> Result<(), String> {
    let raw = std::fs::read(path).map_err(|e| format!("{}: {}", path, e))?;
    let digest = digest::compute(&raw);
    println!("sha256    {}", digest.sha256_hex);
    println!("keccak256 {}", digest.derived_hex);
    Ok(())
}

#[tokio::main]
async fn main() {
    // Check for digest subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "digest" {
        if args.len() != 3 {
            print_digest_usage();
            std::process::exit(1);
        }
        if let Err(e) = run_digest(&args[2]) {
            eprintln!("Error computing digest: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!(
        "Starting sealpost on {} for domain {}",
        config.bind_addr,
        config.service_domain
    );

    // Connect to Redis and verify the connection
    let kv = RedisKv::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");

    let bind_addr = config.bind_addr;
    let state = AppState::new(Arc::new(kv), Arc::new(SystemClock), config);
    let app = sealpost::app(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
