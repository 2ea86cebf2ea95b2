//! Client for the remote diagnostic agent (agent-to-agent protocol).
//!
//! Two calls: a reachability probe (`GET /`, any HTTP status counts as
//! reachable) and the analysis itself (`POST /a2a/analyze`) which runs under a
//! long timeout because the agent may investigate the cluster before
//! answering.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AgentEndpoint;

/// Operator identity sent with every request.
pub const OPERATOR_ID: &str = "argo-rollouts";
const ANALYZE_PATH: &str = "/a2a/analyze";

/// Failure talking to the agent.
#[derive(Debug, Clone, Error)]
pub enum DelegateError {
    /// The probe could not reach the agent at all.
    #[error("health check failed: {0}")]
    Unreachable(String),
    /// The agent answered with a non-success status.
    #[error("agent returned status {0}")]
    Status(u16),
    /// The request failed before a response arrived.
    #[error("failed to send request: {0}")]
    Transport(String),
    /// The agent's answer could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Log bundle and target the agent should inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateContext {
    pub namespace: String,
    pub pod_name: String,
    pub stable_logs: String,
    pub canary_logs: String,
}

/// Body of `POST /a2a/analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateRequest {
    pub user_id: String,
    pub prompt: String,
    pub context: DelegateContext,
}

impl DelegateRequest {
    pub fn new(namespace: &str, pod_name: &str, stable_logs: &str, canary_logs: &str) -> Self {
        Self {
            user_id: OPERATOR_ID.to_string(),
            prompt: format!(
                "Analyze canary deployment issue. Namespace: {namespace}, Pod: {pod_name}. \
                 Compare stable vs canary behavior and determine if canary should be promoted."
            ),
            context: DelegateContext {
                namespace: namespace.to_string(),
                pod_name: pod_name.to_string(),
                stable_logs: stable_logs.to_string(),
                canary_logs: canary_logs.to_string(),
            },
        }
    }
}

/// Successful answer from the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelegateResponse {
    pub analysis: String,
    pub root_cause: String,
    pub remediation: String,
    /// Link to a change the agent opened, when it opened one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_link: Option<String>,
    pub promote: bool,
    pub confidence: i64,
}

impl DelegateResponse {
    /// The change link, if non-empty.
    pub fn change_link(&self) -> Option<&str> {
        self.pr_link.as_deref().filter(|l| !l.is_empty())
    }
}

/// Calls the delegated analyzer depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DelegateClient: Send + Sync {
    /// Reachability only: any HTTP answer is healthy.
    async fn health_check(&self) -> Result<(), DelegateError>;

    async fn analyze(
        &self,
        namespace: &str,
        pod_name: &str,
        stable_logs: &str,
        canary_logs: &str,
    ) -> Result<DelegateResponse, DelegateError>;
}

/// HTTP implementation of [`DelegateClient`].
#[derive(Debug, Clone)]
pub struct A2aClient {
    http: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
    analyze_timeout: Duration,
}

impl A2aClient {
    pub fn new(endpoint: &AgentEndpoint) -> Result<Self, DelegateError> {
        let http = reqwest::Client::builder()
            .timeout(endpoint.health_timeout)
            .build()
            .map_err(|e| DelegateError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            health_timeout: endpoint.health_timeout,
            analyze_timeout: endpoint.analyze_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DelegateClient for A2aClient {
    async fn health_check(&self) -> Result<(), DelegateError> {
        let resp = self
            .http
            .get(format!("{}/", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| DelegateError::Unreachable(e.to_string()))?;

        // A 404 only means there is no health route; the agent is up.
        debug!(status_code = resp.status().as_u16(), "Kubernetes Agent responded to health check");
        Ok(())
    }

    async fn analyze(
        &self,
        namespace: &str,
        pod_name: &str,
        stable_logs: &str,
        canary_logs: &str,
    ) -> Result<DelegateResponse, DelegateError> {
        info!(namespace, pod_name, "Sending analysis request to Kubernetes Agent");

        let request = DelegateRequest::new(namespace, pod_name, stable_logs, canary_logs);
        let resp = self
            .http
            .post(format!("{}{ANALYZE_PATH}", self.base_url))
            .timeout(self.analyze_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| DelegateError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DelegateError::Status(status.as_u16()));
        }

        let result: DelegateResponse = resp
            .json()
            .await
            .map_err(|e| DelegateError::Decode(e.to_string()))?;

        info!(
            promote = result.promote,
            confidence = result.confidence,
            has_change_link = result.change_link().is_some(),
            "Received analysis from Kubernetes Agent"
        );
        Ok(result)
    }
}
