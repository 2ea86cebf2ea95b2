//! Canary Decision Coordination Library
//!
//! Deterministic building blocks of the canary-health decision engine. Nothing
//! in this crate performs I/O; the async analyzers in `canary-agents` drive it.
//!
//! # Modules
//!
//! - `extract`: balanced-brace recovery of the first object in model output
//! - `decision`: the `DecisionRecord` and lenient parsing of model text
//! - `logs`: combining and splitting the stable/canary log context
//! - `resilience`: exponential backoff schedule, per-call retry state and
//!   retry-hint parsing
//! - `verdict`: verdict scoring and the caller-facing `Measurement`

#![allow(clippy::uninlined_format_args)]

pub mod decision;
pub mod extract;
pub mod logs;
pub mod resilience;
pub mod verdict;

pub use decision::{parse_model_output, DecisionRecord, DecisionSource, ParsedDecision};
pub use extract::extract_first_object;
pub use logs::{combine_logs, split_logs, SplitLogs, CANARY_MARKER, STABLE_MARKER};
pub use resilience::{
    parse_retry_delay, BackoffPolicy, DurationParseError, ExponentialBackoff, RetryState,
};
pub use verdict::{resolve, Measurement, MeasurementPhase, Verdict};
