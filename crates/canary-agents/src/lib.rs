//! Canary health analysis.
//!
//! Compares stable and canary workload logs and decides whether the canary
//! should be promoted. Analysis runs either directly against a generative
//! model (with quota-aware retries) or is delegated to a remote diagnostic
//! agent; see [`modes`].
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | `config`      | Engine (env) and per-analysis (JSON) configuration   |
//! | `model`       | Gemini REST caller and its structured error details  |
//! | `retry`       | Rate-limit-aware retry controller                    |
//! | `a2a`         | Diagnostic agent client                              |
//! | `modes`       | Direct / delegated analyzers and the dispatcher      |
//! | `prompts`     | Model instruction text                               |
//! | `fetch`       | Log retrieval collaborator                           |
//! | `remediation` | Failure report collaborator (GitHub issues)          |
//! | `analyzer`    | The end-to-end measurement                           |

pub mod a2a;
pub mod analyzer;
pub mod config;
pub mod fetch;
pub mod model;
pub mod modes;
pub mod prompts;
pub mod remediation;
pub mod retry;

pub use analyzer::CanaryAnalyzer;
pub use config::{AnalysisConfig, EngineConfig};
pub use modes::{AnalysisError, AnalysisInput, AnalysisMode, AnalysisOutput, ModeDispatcher};
