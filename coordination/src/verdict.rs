//! Verdict resolution and the caller-facing measurement.
//!
//! A promoting decision is scored by its confidence; a failing decision is
//! always scored zero, with the confidence kept only as metadata.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionRecord;

/// Metadata key holding the decision narrative.
pub const META_ANALYSIS: &str = "analysis";
/// Metadata key holding the raw model / delegate text.
pub const META_ANALYSIS_JSON: &str = "analysisJSON";
/// Metadata key holding the integer confidence.
pub const META_CONFIDENCE: &str = "confidence";

/// Externally observed outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    /// Canary should be promoted; `score` is confidence / 100.
    Promote { score: f64 },
    /// Canary should not be promoted; the score is always zero.
    Fail { confidence: u8 },
    /// The analysis could not be completed.
    Error { message: String },
}

impl Verdict {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Numeric score: confidence / 100 for `Promote`, zero otherwise.
    pub fn score(&self) -> f64 {
        match self {
            Self::Promote { score } => *score,
            Self::Fail { .. } | Self::Error { .. } => 0.0,
        }
    }

    /// Caller-visible value: two decimals for `Promote`, `"0"` for `Fail`,
    /// empty for `Error`.
    pub fn value(&self) -> String {
        match self {
            Self::Promote { score } => format!("{score:.2}"),
            Self::Fail { .. } => "0".to_string(),
            Self::Error { .. } => String::new(),
        }
    }

    pub fn is_promote(&self) -> bool {
        matches!(self, Self::Promote { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Promote { score } => write!(f, "promote ({score:.2})"),
            Self::Fail { confidence } => write!(f, "fail (confidence {confidence})"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Map a decision onto a verdict.
pub fn resolve(record: &DecisionRecord) -> Verdict {
    if record.promote {
        Verdict::Promote {
            score: f64::from(record.confidence) / 100.0,
        }
    } else {
        Verdict::Fail {
            confidence: record.confidence,
        }
    }
}

/// Phase of a finished (or running) measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementPhase {
    Running,
    Successful,
    Failed,
    Error,
}

impl fmt::Display for MeasurementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Successful => write!(f, "Successful"),
            Self::Failed => write!(f, "Failed"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// One analysis result as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub phase: MeasurementPhase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Measurement {
    /// A running measurement stamped with the current time.
    pub fn start() -> Self {
        Self {
            phase: MeasurementPhase::Running,
            value: String::new(),
            message: String::new(),
            metadata: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record the decision and the raw text it was read from.
    pub fn record_decision(&mut self, record: &DecisionRecord, raw: &str) {
        self.metadata
            .insert(META_ANALYSIS.to_string(), record.narrative.clone());
        self.metadata
            .insert(META_ANALYSIS_JSON.to_string(), raw.to_string());
        self.metadata
            .insert(META_CONFIDENCE.to_string(), record.confidence.to_string());
    }

    /// Close the measurement with the given verdict.
    pub fn finish(mut self, verdict: &Verdict) -> Self {
        self.phase = match verdict {
            Verdict::Promote { .. } => MeasurementPhase::Successful,
            Verdict::Fail { .. } => MeasurementPhase::Failed,
            Verdict::Error { message } => {
                self.message = message.clone();
                MeasurementPhase::Error
            }
        };
        self.value = verdict.value();
        self.finished_at = Some(Utc::now());
        self
    }

    /// Close the measurement as successful with an explicit value.
    pub fn succeed_with(mut self, value: impl Into<String>) -> Self {
        self.phase = MeasurementPhase::Successful;
        self.value = value.into();
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
