//! bookstore-server: entry point for the book store gRPC service.
//!
//! Loads config, builds the in-memory store, then serves the book service
//! on the configured host and port until Ctrl+C or SIGTERM.

use bookstore_server::{lock_policy, resolve, serve, shutdown_signal, Stopped};
use bookstore_storage::BookStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bookstore_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = bookstore_config::load_from_file(std::path::Path::new(&config_path))
        .unwrap_or_else(|e| {
            tracing::warn!(
                "failed to load config from {}: {}, using defaults",
                config_path,
                e
            );
            bookstore_config::Config::default()
        });

    let policy = lock_policy(&config);
    tracing::info!(
        max_attempts = policy.max_attempts,
        attempt_timeout_ms = policy.attempt_timeout.as_millis() as u64,
        "lock policy"
    );
    let store = Arc::new(BookStore::new(policy));

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], metrics_port));
        tokio::spawn(async move {
            if let Err(e) = bookstore_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    let addr = resolve(&config.address()).await?;
    tracing::info!("server started, listening on {}", addr);

    match serve(addr, store, config.shutdown_grace(), shutdown_signal()).await? {
        Stopped::Drained => {}
        Stopped::Forced => tracing::warn!("forced shutdown after grace period"),
    }

    Ok(())
}
