//! Analysis error taxonomy with retry classification.
//!
//! Every error an analysis can surface to its caller is represented here.
//! Callers can query `kind()` / `is_retriable()` without string matching.
//!
//! ## Kinds
//!
//! | Kind                | Retriable | Origin                                    |
//! |---------------------|-----------|-------------------------------------------|
//! | Configuration       | no        | missing delegated-mode inputs, bad config |
//! | TransientUpstream   | yes       | model rate limit (retries exhausted)      |
//! | PermanentUpstream   | no        | any other model call failure              |
//! | DelegateUnreachable | no        | agent failed the reachability probe       |
//! | Delegate            | no        | agent answered with an error / bad body   |
//! | Cancelled           | no        | caller cancelled while waiting            |
//!
//! Malformed model output is not an error: it degrades to a zero-value
//! decision record. Remediation failures are logged, never surfaced.

use std::fmt;

use thiserror::Error;

use crate::a2a::DelegateError;
use crate::model::ModelError;
use crate::retry::RetryError;

/// Classification used by callers to decide whether to retry an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    TransientUpstream,
    PermanentUpstream,
    DelegateUnreachable,
    Delegate,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::TransientUpstream)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::TransientUpstream => write!(f, "transient_upstream"),
            Self::PermanentUpstream => write!(f, "permanent_upstream"),
            Self::DelegateUnreachable => write!(f, "delegate_unreachable"),
            Self::Delegate => write!(f, "delegate"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Unified error type for analysis operations.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Required configuration or inputs are missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model kept rate-limiting until the attempt budget ran out.
    #[error("max retries exceeded after {attempts} attempts, last error: {last}")]
    RateLimited { attempts: u32, last: ModelError },

    /// The model call failed with a non-retriable error.
    #[error("model call failed: {0}")]
    Upstream(ModelError),

    /// The diagnostic agent could not be reached.
    #[error("delegate unreachable: {0}")]
    DelegateUnreachable(DelegateError),

    /// The diagnostic agent was reached but the analysis failed.
    #[error("delegate analysis failed: {0}")]
    Delegate(DelegateError),

    /// The caller cancelled the analysis.
    #[error("analysis cancelled")]
    Cancelled,

    /// Any other error that doesn't fit the above categories.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::RateLimited { .. } => ErrorKind::TransientUpstream,
            Self::Upstream(_) => ErrorKind::PermanentUpstream,
            Self::DelegateUnreachable(_) => ErrorKind::DelegateUnreachable,
            Self::Delegate(_) => ErrorKind::Delegate,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if a later re-run of the analysis may succeed.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

impl From<RetryError<ModelError>> for AnalysisError {
    fn from(err: RetryError<ModelError>) -> Self {
        match err {
            RetryError::Permanent(e) => Self::Upstream(e),
            RetryError::Exhausted { attempts, last } => Self::RateLimited { attempts, last },
            RetryError::Cancelled => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limit() -> ModelError {
        ModelError::api(429, "RESOURCE_EXHAUSTED", "quota exceeded")
    }

    #[test]
    fn configuration_is_terminal() {
        let err = AnalysisError::configuration("namespace is required");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "Configuration error: namespace is required");
    }

    #[test]
    fn exhausted_rate_limit_is_transient() {
        let err: AnalysisError = RetryError::Exhausted {
            attempts: 3,
            last: rate_limit(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::TransientUpstream);
        assert!(err.is_retriable());
        assert!(err
            .to_string()
            .starts_with("max retries exceeded after 3 attempts, last error:"));
    }

    #[test]
    fn permanent_model_failure_is_not_retriable() {
        let err: AnalysisError =
            RetryError::Permanent(ModelError::api(400, "INVALID_ARGUMENT", "bad model")).into();
        assert_eq!(err.kind(), ErrorKind::PermanentUpstream);
        assert!(!err.is_retriable());
    }

    #[test]
    fn cancellation_maps_through() {
        let err: AnalysisError = RetryError::<ModelError>::Cancelled.into();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::DelegateUnreachable.to_string(), "delegate_unreachable");
        assert_eq!(ErrorKind::TransientUpstream.to_string(), "transient_upstream");
    }
}
