//! Resilience: quota-aware backoff scheduling
//!
//! Deterministic half of the retry protocol used against the model API:
//! the exponential schedule, the per-call retry state, and parsing of the
//! server-supplied retry hint. The async driver that actually sleeps and
//! honours cancellation lives in the agents crate.
//!
//! # Design
//!
//! ```text
//! attempt fails (rate limited)
//!   ├─ hint present  → wait = hint            (next wait only, schedule untouched)
//!   └─ no hint       → wait = schedule.next() (1s, 2s, 4s, ... capped at 60s, ±10%)
//! attempt fails (anything else) → permanent, no wait
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::resilience::{BackoffPolicy, RetryState};
//!
//! let mut state = RetryState::new(BackoffPolicy::default());
//! state.begin_attempt();
//! state.set_hint(parse_retry_delay("30s").ok());
//! let wait = state.next_wait(); // 30s
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters of the exponential schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// First wait.
    pub initial_interval: Duration,
    /// Cap on the un-randomized interval.
    pub max_interval: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
    /// Jitter as a fraction of the current interval (0.1 = ±10%).
    pub randomization_factor: f64,
}

impl Default for BackoffPolicy {
    /// Default: 1s initial, 2x multiplier, 60s cap, ±10% jitter.
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            randomization_factor: 0.1,
        }
    }
}

impl BackoffPolicy {
    /// A policy with no jitter, for predictable schedules.
    pub fn without_jitter(mut self) -> Self {
        self.randomization_factor = 0.0;
        self
    }
}

/// Exponential backoff schedule.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.initial_interval,
            policy,
        }
    }

    /// Restart the schedule from the initial interval.
    pub fn reset(&mut self) {
        self.current = self.policy.initial_interval;
    }

    /// The un-randomized interval the next call will be based on.
    pub fn current_interval(&self) -> Duration {
        self.current
    }

    /// Next wait using the thread-local RNG.
    pub fn next_backoff(&mut self) -> Duration {
        self.next_backoff_with(&mut rand::thread_rng())
    }

    /// Next wait: the current interval randomized within
    /// `[current - f*current, current + f*current]`, then advance the
    /// interval by the multiplier up to the cap.
    pub fn next_backoff_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let base = self.current.as_secs_f64();
        let delta = self.policy.randomization_factor.clamp(0.0, 1.0) * base;
        let wait = if delta > 0.0 {
            rng.gen_range((base - delta)..=(base + delta))
        } else {
            base
        };

        let max = self.policy.max_interval.as_secs_f64();
        let grown = base * self.policy.multiplier;
        self.current = if grown >= max {
            self.policy.max_interval
        } else {
            Duration::from_secs_f64(grown)
        };

        Duration::from_secs_f64(wait.max(0.0))
    }
}

/// Transient per-call retry bookkeeping.
///
/// Created at the start of a call and dropped when it ends; never shared
/// between calls.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    backoff: ExponentialBackoff,
    hint: Option<Duration>,
}

impl RetryState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            attempt: 0,
            backoff: ExponentialBackoff::new(policy),
            hint: None,
        }
    }

    /// Record the start of an attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Whether another attempt fits within `max_attempts`.
    pub fn has_budget(&self, max_attempts: u32) -> bool {
        self.attempt < max_attempts
    }

    /// Server-suggested wait for the next attempt only. Zero is ignored.
    pub fn set_hint(&mut self, hint: Option<Duration>) {
        self.hint = hint.filter(|d| !d.is_zero());
    }

    /// Pending server hint, if any.
    pub fn hint(&self) -> Option<Duration> {
        self.hint
    }

    /// Wait before the next attempt. A pending hint is consumed verbatim and
    /// leaves the exponential schedule where it was.
    pub fn next_wait(&mut self) -> Duration {
        match self.hint.take() {
            Some(hint) => hint,
            None => self.backoff.next_backoff(),
        }
    }
}

/// Why a retry hint could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("duration {0:?} out of range")]
    Overflow(String),
}

/// Parse a retry hint such as `"30s"`, `"1.5s"`, `"250ms"` or `"1m30s"`.
///
/// Only the `<decimal><unit>` sequence format is accepted, with units `h`,
/// `m`, `s`, `ms`, `us`/`µs` and `ns`. Signs and bare numbers are rejected.
pub fn parse_retry_delay(input: &str) -> Result<Duration, DurationParseError> {
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut rest = input;
    let mut total_nanos = 0f64;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(DurationParseError::Invalid(input.to_string()));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| DurationParseError::Invalid(input.to_string()))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        if unit.is_empty() {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;
        rest = &rest[unit_len..];

        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos >= u64::MAX as f64 {
        return Err(DurationParseError::Overflow(input.to_string()));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3_600e9,
        _ => return None,
    };
    Some(nanos)
}
