//! Analysis modes and the dispatcher that selects between them.
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                                    |
//! |-------------|------------------------------------------------------------|
//! | `errors`    | Error taxonomy with retry classification                   |
//! | `direct`    | Prompt the model directly through the retry controller    |
//! | `delegated` | Health-check and delegate to the remote diagnostic agent  |
//!
//! Exactly one mode runs per invocation. Delegated mode requires a namespace
//! and target; when they are missing the dispatcher fails with a
//! configuration error and never falls back to direct mode.

pub mod delegated;
pub mod direct;
pub mod errors;

use std::fmt;

use coordination::decision::DecisionRecord;
use coordination::logs::combine_logs;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use delegated::DelegatedAnalyzer;
pub use direct::DirectAnalyzer;
pub use errors::{AnalysisError, ErrorKind};

/// Which analyzer handles an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Ask the generative model directly.
    #[default]
    Direct,
    /// Delegate to the remote diagnostic agent.
    Delegated,
}

impl AnalysisMode {
    /// Exactly `"agent"` selects delegated mode; every other value, including
    /// the empty string and other spellings, selects direct mode.
    pub fn parse(value: &str) -> Self {
        if value == "agent" {
            Self::Delegated
        } else {
            Self::Direct
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "default"),
            Self::Delegated => write!(f, "agent"),
        }
    }
}

/// Immutable input to one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    /// Model identifier (direct mode).
    pub model: String,
    /// Combined stable/canary log context.
    pub log_context: String,
    /// Operator guidance appended to the model instructions.
    pub extra_guidance: Option<String>,
    /// Delegated mode: namespace the agent inspects.
    pub namespace: String,
    /// Delegated mode: resource (pod) the agent inspects.
    pub target: String,
}

impl AnalysisInput {
    pub fn new(model: impl Into<String>, log_context: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            log_context: log_context.into(),
            extra_guidance: None,
            namespace: String::new(),
            target: String::new(),
        }
    }

    /// Build the combined context from separate stable and canary logs.
    pub fn from_segments(model: impl Into<String>, stable: &str, canary: &str) -> Self {
        Self::new(model, combine_logs(stable, canary))
    }

    pub fn with_extra_guidance(mut self, guidance: impl Into<String>) -> Self {
        let guidance = guidance.into();
        self.extra_guidance = Some(guidance).filter(|g| !g.is_empty());
        self
    }

    pub fn with_target(mut self, namespace: impl Into<String>, target: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self.target = target.into();
        self
    }

    /// Delegated-mode precondition: namespace and target both set.
    pub fn require_target(&self) -> Result<(), AnalysisError> {
        if self.namespace.is_empty() || self.target.is_empty() {
            return Err(AnalysisError::configuration(
                "agent mode requires namespace and podName to be configured",
            ));
        }
        Ok(())
    }
}

/// Raw text for auditing plus the structured decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutput {
    pub raw: String,
    pub record: DecisionRecord,
}

/// Routes an invocation to the configured analyzer.
#[derive(Clone)]
pub struct ModeDispatcher {
    direct: DirectAnalyzer,
    delegated: DelegatedAnalyzer,
}

impl ModeDispatcher {
    pub fn new(direct: DirectAnalyzer, delegated: DelegatedAnalyzer) -> Self {
        Self { direct, delegated }
    }

    pub async fn dispatch(
        &self,
        mode: AnalysisMode,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutput, AnalysisError> {
        info!(
            mode = %mode,
            namespace = %input.namespace,
            target = %input.target,
            "Analyzing with mode"
        );

        match mode {
            AnalysisMode::Direct => self.direct.analyze(input, cancel).await,
            AnalysisMode::Delegated => {
                input.require_target()?;
                self.delegated.analyze(input, cancel).await
            }
        }
    }
}
