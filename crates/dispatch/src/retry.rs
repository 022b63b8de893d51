//! Bounded retry with linear backoff around one fallible async operation.
//!
//! Channel-agnostic: knows nothing about notifications, only "an operation
//! that returns `bool` or errors, tried at most `max_attempts` times".

use std::future::Future;
use std::time::Duration;

use crate::error::SendError;

/// Retry parameters. `max_attempts` counts the first attempt, so 1 means
/// no retries; `base_delay` must be non-zero.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        debug_assert!(max_attempts >= 1, "max_attempts must be at least 1");
        debug_assert!(!base_delay.is_zero(), "base_delay must be non-zero");
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff after failed attempt `attempt` (1-based): `base_delay * attempt`.
    /// Linear, not exponential.
    fn next_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `op` up to `policy.max_attempts` times.
///
/// An attempt returning `Ok(true)` succeeds immediately with no further
/// attempts and no trailing backoff. `Ok(false)` and `Err` both count as
/// failed attempts; between failed attempt `k` and attempt `k + 1` the task
/// suspends for `base_delay * k` (other dispatch tasks keep running).
///
/// Exhaustion is a definite outcome, not an error: after the last failed
/// attempt this returns `false` so the caller can always reach
/// reconciliation.
pub async fn run_with_retry<F, Fut>(policy: &RetryPolicy, mut op: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, SendError>>,
{
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(true) => {
                tracing::debug!(attempt, max_attempts = policy.max_attempts, "Attempt succeeded");
                return true;
            }
            Ok(false) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Attempt rejected by remote side"
                );
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed"
                );
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.next_delay(attempt)).await;
        }
    }

    tracing::warn!(
        max_attempts = policy.max_attempts,
        "All attempts exhausted"
    );
    false
}
