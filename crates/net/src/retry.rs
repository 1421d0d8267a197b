//! Client-side retry with exponential backoff.
//!
//! [`Retry::run`] invokes a remote call, retries transport failures whose
//! code is transient (see [`is_retryable`]) and propagates everything else
//! at once. Between attempts it sleeps for the current backoff, which
//! starts at `initial_backoff` and is multiplied after every sleep up to
//! `max_backoff`. Backoff state lives inside a single `run` call.
//!
//! Domain-level rejections (`success = false`) are successful RPCs and are
//! never retried here.

use std::future::Future;
use tokio::sync::watch;
use tokio::time::Duration;
use tonic::{Code, Status};

/// Status codes that indicate a transient failure.
pub const RETRYABLE_CODES: [Code; 5] = [
    Code::Unavailable,
    Code::DeadlineExceeded,
    Code::ResourceExhausted,
    Code::Aborted,
    Code::Cancelled,
];

pub fn is_retryable(code: Code) -> bool {
    RETRYABLE_CODES.contains(&code)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff to use after sleeping for `current`. A product too large
    /// (or not finite) for a `Duration` saturates at the ceiling.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map_or(self.max_backoff, |next| next.min(self.max_backoff))
    }
}

impl From<&bookstore_config::RetryConfig> for RetryPolicy {
    fn from(config: &bookstore_config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            multiplier: config.multiplier,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Non-retryable failure, or the last of the retryable ones.
    #[error("{operation} failed after {attempts} attempt(s): {status}")]
    Rpc {
        operation: String,
        attempts: u32,
        status: Status,
    },
    /// The backoff sleep was cancelled by the caller.
    #[error("retry interrupted for {operation}")]
    Interrupted { operation: String },
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl CallError {
    /// The transport status, when the failure came from the server.
    pub fn status(&self) -> Option<&Status> {
        match self {
            CallError::Rpc { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Retry driver. Cheap to clone; each [`Retry::run`] starts from a fresh
/// backoff.
#[derive(Debug, Clone, Default)]
pub struct Retry {
    policy: RetryPolicy,
    cancel: Option<watch::Receiver<bool>>,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Abort backoff sleeps once `cancel` turns `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails fatally, or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut cancel = self.cancel.clone();
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 1;

        loop {
            let status = match call().await {
                Ok(value) => return Ok(value),
                Err(status) => status,
            };

            if !is_retryable(status.code()) || attempt >= max_attempts {
                if is_retryable(status.code()) {
                    tracing::warn!(operation, attempt, "giving up: {}", status);
                } else {
                    tracing::debug!(operation, attempt, "non-retryable failure: {}", status);
                }
                return Err(CallError::Rpc {
                    operation: operation.to_string(),
                    attempts: attempt,
                    status,
                });
            }

            tracing::info!(
                operation,
                attempt,
                code = ?status.code(),
                backoff_ms = backoff.as_millis() as u64,
                "retryable failure, backing off"
            );
            bookstore_metrics::metrics()
                .client_retries
                .with_label_values(&[operation])
                .inc();

            if !sleep_unless_cancelled(backoff, cancel.as_mut()).await {
                return Err(CallError::Interrupted {
                    operation: operation.to_string(),
                });
            }
            backoff = self.policy.next_backoff(backoff);
            attempt += 1;
        }
    }
}

/// Sleep for `duration`. Returns `false` if cancelled first.
async fn sleep_unless_cancelled(
    duration: Duration,
    cancel: Option<&mut watch::Receiver<bool>>,
) -> bool {
    let Some(cancel) = cancel else {
        tokio::time::sleep(duration).await;
        return true;
    };
    tokio::select! {
        biased;
        _ = cancelled(cancel) => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
