//! Bounded-retry lock acquisition.
//!
//! A lock wait inside the store is never unbounded: each attempt times out
//! after `attempt_timeout`, and after `max_attempts` failed attempts the
//! caller gets [`Acquire::Exhausted`] instead of a guard. A store-wide
//! interrupt signal cuts any wait short with [`Acquire::Interrupted`].

use std::future::Future;
use tokio::sync::watch;
use tokio::time::Duration;

/// How hard the store tries to take an entry lock before reporting busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Number of timed attempts for get/update/delete.
    pub max_attempts: u32,
    /// Wait per attempt. `list` makes exactly one attempt of this length.
    pub attempt_timeout: Duration,
}

impl LockPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn new(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
        }
    }

    /// Worst-case time a single operation waits before reporting busy.
    pub fn budget(&self) -> Duration {
        self.attempt_timeout * self.max_attempts
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_ATTEMPT_TIMEOUT)
    }
}

/// Outcome of a bounded lock acquisition.
#[derive(Debug)]
pub(crate) enum Acquire<G> {
    Acquired(G),
    Exhausted,
    Interrupted,
}

/// Receiving side of the store's shutdown signal.
#[derive(Debug, Clone)]
pub(crate) struct Interrupt(watch::Receiver<bool>);

impl Interrupt {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    /// Resolves once the signal has been raised.
    async fn raised(&mut self) {
        if self.0.wait_for(|raised| *raised).await.is_err() {
            // Sender gone: nobody can raise the signal any more.
            std::future::pending::<()>().await;
        }
    }
}

/// Make one attempt of at most `policy.attempt_timeout`.
pub(crate) async fn acquire_once<G, F, Fut>(
    policy: &LockPolicy,
    interrupt: &mut Interrupt,
    lock: &mut F,
) -> Acquire<G>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = G>,
{
    tokio::select! {
        biased;
        _ = interrupt.raised() => Acquire::Interrupted,
        res = tokio::time::timeout(policy.attempt_timeout, lock()) => match res {
            Ok(guard) => Acquire::Acquired(guard),
            Err(_) => Acquire::Exhausted,
        },
    }
}

/// Make up to `policy.max_attempts` attempts.
pub(crate) async fn acquire_with_retry<G, F, Fut>(
    policy: &LockPolicy,
    interrupt: &mut Interrupt,
    mut lock: F,
) -> Acquire<G>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = G>,
{
    for attempt in 1..=policy.max_attempts {
        match acquire_once(policy, interrupt, &mut lock).await {
            Acquire::Exhausted => {
                tracing::trace!(attempt, "lock attempt timed out");
            }
            outcome => return outcome,
        }
    }
    Acquire::Exhausted
}
