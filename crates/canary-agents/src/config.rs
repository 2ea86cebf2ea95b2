//! Process-wide and per-analysis configuration.
//!
//! `EngineConfig` is built once before any component exists and handed to
//! each constructor; nothing inside the engine reads the environment.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (e.g. `GOOGLE_API_KEY`, `K8S_AGENT_URL`)
//! 2. Built-in defaults

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modes::AnalysisMode;

/// Provider name reported in analysis metadata.
pub const PROVIDER_TYPE: &str = "MetricAI";
/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default GitHub REST endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
/// Default in-cluster address of the diagnostic agent.
pub const DEFAULT_AGENT_URL: &str = "http://kubernetes-agent.argo-rollouts.svc.cluster.local:8080";
/// Model used when the analysis config names none.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Label selector for stable pods when none is configured.
pub const DEFAULT_STABLE_LABEL: &str = "role=stable";
/// Label selector for canary pods when none is configured.
pub const DEFAULT_CANARY_LABEL: &str = "role=canary";
/// Attempts per model call, first attempt included.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
/// Delegate analysis may run a multi-step investigation.
const DEFAULT_ANALYZE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
const ENV_GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const ENV_GITHUB_API_URL: &str = "GITHUB_API_URL";
const ENV_AGENT_URL: &str = "K8S_AGENT_URL";
const ENV_MAX_ATTEMPTS: &str = "CANARY_MAX_ATTEMPTS";

/// Model API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub api_key: String,
    /// Informational only; not sent with requests.
    pub project: Option<String>,
    pub timeout: Duration,
}

/// Diagnostic agent access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEndpoint {
    pub base_url: String,
    /// Timeout for the reachability probe.
    pub health_timeout: Duration,
    /// Timeout for a single analyze request.
    pub analyze_timeout: Duration,
}

/// Source-control access for failure reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationEndpoint {
    pub api_url: String,
    pub token: String,
}

/// Immutable engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub model: ModelEndpoint,
    pub agent: AgentEndpoint,
    pub remediation: RemediationEndpoint,
    /// Attempts per model call, first attempt included.
    pub max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelEndpoint {
                base_url: env::var(ENV_GEMINI_BASE_URL)
                    .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
                api_key: env_trimmed(ENV_GOOGLE_API_KEY).unwrap_or_default(),
                project: env_trimmed(ENV_GOOGLE_CLOUD_PROJECT),
                timeout: DEFAULT_MODEL_TIMEOUT,
            },
            agent: AgentEndpoint {
                base_url: env::var(ENV_AGENT_URL).unwrap_or_else(|_| DEFAULT_AGENT_URL.to_string()),
                health_timeout: DEFAULT_HEALTH_TIMEOUT,
                analyze_timeout: DEFAULT_ANALYZE_TIMEOUT,
            },
            remediation: RemediationEndpoint {
                api_url: env::var(ENV_GITHUB_API_URL)
                    .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string()),
                token: env_trimmed(ENV_GITHUB_TOKEN).unwrap_or_default(),
            },
            max_attempts: env::var(ENV_MAX_ATTEMPTS)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl EngineConfig {
    /// Build from environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Validate the config; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.api_key.is_empty() {
            return Err(format!("{ENV_GOOGLE_API_KEY} is required but not configured"));
        }
        if self.remediation.token.is_empty() {
            return Err(format!("{ENV_GITHUB_TOKEN} is required but not configured"));
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }
        if self.model.timeout.is_zero()
            || self.agent.health_timeout.is_zero()
            || self.agent.analyze_timeout.is_zero()
        {
            return Err("request timeouts must be > 0".to_string());
        }
        Ok(())
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Per-analysis settings supplied by the caller as JSON.
///
/// Every field is optional; empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Model identifier; defaults to [`DEFAULT_MODEL`].
    pub model: String,
    pub stable_label: String,
    pub canary_label: String,
    /// Base branch referenced in failure reports.
    pub base_branch: String,
    /// Repository failure reports are filed against.
    pub github_url: String,
    /// `"agent"` selects delegated mode; anything else is direct.
    pub analysis_mode: String,
    /// Delegated mode: namespace the agent should inspect.
    pub namespace: String,
    /// Delegated mode: pod the agent should inspect.
    pub pod_name: String,
    /// Free text appended to the model instructions.
    pub extra_prompt: String,
}

impl AnalysisConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn model(&self) -> &str {
        non_empty_or(&self.model, DEFAULT_MODEL)
    }

    pub fn stable_label(&self) -> &str {
        non_empty_or(&self.stable_label, DEFAULT_STABLE_LABEL)
    }

    pub fn canary_label(&self) -> &str {
        non_empty_or(&self.canary_label, DEFAULT_CANARY_LABEL)
    }

    pub fn mode(&self) -> AnalysisMode {
        AnalysisMode::parse(&self.analysis_mode)
    }

    pub fn extra_prompt(&self) -> Option<&str> {
        Some(self.extra_prompt.as_str()).filter(|s| !s.is_empty())
    }

    /// Provider description: the provider name plus whichever of the model
    /// and label fields were explicitly set.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::from([("provider".to_string(), PROVIDER_TYPE.to_string())]);
        for (key, value) in [
            ("model", &self.model),
            ("stableLabel", &self.stable_label),
            ("canaryLabel", &self.canary_label),
        ] {
            if !value.is_empty() {
                meta.insert(key.to_string(), value.clone());
            }
        }
        meta
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
