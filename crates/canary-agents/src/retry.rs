//! Quota-aware retry controller.
//!
//! Wraps a single upstream call with bounded exponential backoff. Only
//! rate-limit errors are retried; their server-supplied retry hint, when
//! present, replaces the computed wait for the next attempt. Every other
//! error is permanent and returned after the first failure.
//!
//! The wait between attempts (and the attempt itself) is cancellable through
//! the `CancellationToken` threaded in by the caller.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use coordination::resilience::{BackoffPolicy, RetryState};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Attempts per call in the reference configuration.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What the controller needs to know about a failed attempt.
pub trait RateLimitSignal {
    /// Whether the failure is a rate-limit / resource-exhaustion signal.
    fn is_rate_limited(&self) -> bool;

    /// Server-suggested wait before the next attempt.
    fn retry_hint(&self) -> Option<Duration>;

    /// Emit diagnostics for the failure. Must not affect control flow.
    fn report(&self) {}
}

/// Terminal outcome of a retried call.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Non-retriable failure on the attempt that produced it.
    #[error("{0}")]
    Permanent(E),
    /// Every attempt was rate limited.
    #[error("max retries exceeded after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: E },
    /// The caller cancelled before the call completed.
    #[error("operation cancelled")]
    Cancelled,
}

/// Retry driver. Holds only immutable policy; each `execute` call owns its
/// own [`RetryState`].
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: BackoffPolicy,
    max_attempts: u32,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryController {
    /// Controller with the default backoff policy. `max_attempts` is raised
    /// to 1 if zero.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            policy: BackoffPolicy::default(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// attempt budget, or `cancel` fires.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RateLimitSignal + fmt::Display,
    {
        let mut state = RetryState::new(self.policy);

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            let attempt = state.begin_attempt();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = operation() => outcome,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            err.report();

            if !err.is_rate_limited() {
                debug!(attempt, error = %err, "Permanent upstream error, not retrying");
                return Err(RetryError::Permanent(err));
            }

            state.set_hint(err.retry_hint());
            if !state.has_budget(self.max_attempts) {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let hinted = state.hint().is_some();
            let wait = state.next_wait();
            if hinted {
                warn!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit exceeded, using API-suggested wait time"
                );
            } else {
                warn!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit exceeded, using exponential backoff"
                );
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
