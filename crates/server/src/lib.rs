//! Server lifecycle: bind, serve, drain on shutdown.
//!
//! [`serve`] runs the gRPC router until `signal` resolves, then stops
//! accepting connections and gives in-flight calls `grace` to finish. Calls
//! still waiting on a record lock after that are interrupted through
//! [`BookStore::shutdown`] and answered with CANCELLED. The server task is
//! aborted only if it is still running after [`INTERRUPT_WINDOW`].

use bookstore_config::Config;
use bookstore_storage::{BookStore, LockPolicy};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to resolve {0}")]
    Resolve(String, #[source] std::io::Error),
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("gRPC transport failed: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How the server came down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stopped {
    /// All in-flight calls finished within the grace period.
    Drained,
    /// The grace period ran out; remaining calls were interrupted.
    Forced,
}

/// How long interrupted calls get to reply before the server task is
/// aborted.
pub const INTERRUPT_WINDOW: Duration = Duration::from_secs(1);

pub fn lock_policy(config: &Config) -> LockPolicy {
    LockPolicy::new(config.locking.max_attempts, config.locking.attempt_timeout())
}

/// Resolve `host:port` to the first socket address.
pub async fn resolve(address: &str) -> Result<SocketAddr, ServeError> {
    tokio::net::lookup_host(address)
        .await
        .map_err(|e| ServeError::Resolve(address.to_string(), e))?
        .next()
        .ok_or_else(|| ServeError::NoAddress(address.to_string()))
}

pub async fn serve(
    addr: SocketAddr,
    store: Arc<BookStore>,
    grace: Duration,
    signal: impl Future<Output = ()>,
) -> Result<Stopped, ServeError> {
    let router = bookstore_net::build_server(store.clone());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(router.serve_with_shutdown(addr, async {
        let _ = stop_rx.await;
    }));
    tracing::info!("serving gRPC on {}", addr);

    tokio::select! {
        result = &mut server => {
            // The server ended without being asked to.
            result??;
            return Ok(Stopped::Drained);
        }
        _ = signal => {}
    }

    tracing::info!(
        grace_ms = grace.as_millis() as u64,
        "shutting down, draining in-flight calls"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => {
            result??;
            tracing::info!("server shut down");
            Ok(Stopped::Drained)
        }
        Err(_) => {
            tracing::warn!("grace period expired, interrupting remaining calls");
            store.shutdown();
            // Interrupted handlers still owe their callers a CANCELLED reply.
            match tokio::time::timeout(INTERRUPT_WINDOW, &mut server).await {
                Ok(Ok(Err(e))) => tracing::warn!("server stopped with error: {}", e),
                Ok(Err(e)) => tracing::warn!("server task failed: {}", e),
                Ok(Ok(Ok(()))) => tracing::info!("server shut down"),
                Err(_) => {
                    tracing::warn!("calls still running after interrupt, aborting server");
                    server.abort();
                }
            }
            Ok(Stopped::Forced)
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
