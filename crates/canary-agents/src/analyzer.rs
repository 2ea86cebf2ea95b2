//! One canary measurement: fetch logs, analyze, resolve, remediate.
//!
//! ```text
//! LogFetcher ──► combine ──► ModeDispatcher ──► resolve ──► Measurement
//!                                                  │
//!                                                  └─ Fail ─► Remediator
//! ```
//!
//! Delegated mode checks its target before dispatch and, when the pod name is
//! a bare template hash, resolves it to a pod through the fetcher.
//!
//! Every failure along the way becomes an `Error` measurement; `run` itself
//! never returns an error.

use std::sync::Arc;

use anyhow::Result;
use coordination::verdict::{resolve, Measurement, Verdict};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::a2a::A2aClient;
use crate::config::{AnalysisConfig, EngineConfig};
use crate::fetch::{LogFetchError, LogFetcher};
use crate::model::GeminiClient;
use crate::modes::{
    AnalysisInput, AnalysisMode, DelegatedAnalyzer, DirectAnalyzer, ModeDispatcher,
};
use crate::remediation::{FailureReport, GitHubIssueReporter, Remediator};
use crate::retry::RetryController;

/// Value reported when there are no canary pods to judge.
pub const NO_CANARY_VALUE: &str = "1";

pub struct CanaryAnalyzer {
    dispatcher: ModeDispatcher,
    fetcher: Arc<dyn LogFetcher>,
    remediator: Arc<dyn Remediator>,
}

impl CanaryAnalyzer {
    pub fn new(
        dispatcher: ModeDispatcher,
        fetcher: Arc<dyn LogFetcher>,
        remediator: Arc<dyn Remediator>,
    ) -> Self {
        Self {
            dispatcher,
            fetcher,
            remediator,
        }
    }

    /// Wire the HTTP-backed collaborators from `config`.
    pub fn from_config(config: &EngineConfig, fetcher: Arc<dyn LogFetcher>) -> Result<Self> {
        let direct = DirectAnalyzer::new(
            Arc::new(GeminiClient::new(&config.model)?),
            RetryController::new(config.max_attempts),
        );
        let delegated = DelegatedAnalyzer::new(Arc::new(A2aClient::new(&config.agent)?));
        let remediator = Arc::new(GitHubIssueReporter::new(&config.remediation)?);
        Ok(Self::new(
            ModeDispatcher::new(direct, delegated),
            fetcher,
            remediator,
        ))
    }

    pub async fn run(
        &self,
        config: &AnalysisConfig,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Measurement {
        let measurement = Measurement::start();

        let stable = match self
            .fetcher
            .fetch_first_pod_logs(namespace, config.stable_label())
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                error!(error = %e, selector = config.stable_label(), "Failed to fetch stable logs");
                return measurement.finish(&Verdict::error(e.to_string()));
            }
        };

        let canary = match self
            .fetcher
            .fetch_first_pod_logs(namespace, config.canary_label())
            .await
        {
            Ok(logs) => logs,
            Err(LogFetchError::NotFound(selector)) => {
                info!(selector = %selector, "No canary pods found; nothing to analyze");
                return measurement.succeed_with(NO_CANARY_VALUE);
            }
            Err(e) => {
                error!(error = %e, selector = config.canary_label(), "Failed to fetch canary logs");
                return measurement.finish(&Verdict::error(e.to_string()));
            }
        };

        let mode = config.mode();
        let mut input = AnalysisInput::from_segments(config.model(), &stable, &canary)
            .with_target(&config.namespace, &config.pod_name);
        if let Some(extra) = config.extra_prompt() {
            input = input.with_extra_guidance(extra);
        }

        if mode == AnalysisMode::Delegated {
            if let Err(e) = input.require_target() {
                error!(error = %e, "Invalid agent mode configuration");
                return measurement.finish(&Verdict::error(e.to_string()));
            }
            if !input.target.contains('-') {
                match self.resolve_template_hash(&input.namespace, &input.target).await {
                    Ok(pod) => input.target = pod,
                    Err(message) => return measurement.finish(&Verdict::error(message)),
                }
            }
        }

        let output = match self.dispatcher.dispatch(mode, &input, cancel).await {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, kind = %e.kind(), "Canary analysis failed");
                return measurement.finish(&Verdict::error(e.to_string()));
            }
        };

        let verdict = resolve(&output.record);
        info!(verdict = %verdict, "Canary analysis resolved");

        if verdict.is_fail() {
            let report = FailureReport {
                log_context: input.log_context.clone(),
                narrative: output.record.narrative.clone(),
                base_branch: config.base_branch.clone(),
                repository_url: config.github_url.clone(),
                model: config.model().to_string(),
            };
            if let Err(e) = self.remediator.open_failure_report(&report).await {
                warn!(error = %e, "Failed to create canary failure report");
            }
        }

        let mut measurement = measurement;
        measurement.record_decision(&output.record, &output.raw);
        measurement.finish(&verdict)
    }

    /// A pod name without a `-` is a `rollouts-pod-template-hash`; swap it
    /// for the first pod carrying that hash.
    async fn resolve_template_hash(&self, namespace: &str, hash: &str) -> Result<String, String> {
        debug!(
            namespace,
            template_hash = hash,
            "podName looks like a template hash, looking for matching pod"
        );
        match self.fetcher.resolve_pod_by_template_hash(namespace, hash).await {
            Ok(pod) => {
                info!(
                    template_hash = hash,
                    resolved_pod_name = %pod,
                    "Resolved pod template hash to pod name"
                );
                Ok(pod)
            }
            Err(LogFetchError::NotFound(_)) => {
                error!(template_hash = hash, "No pods found for template hash");
                Err(format!("no pods found with template hash {hash}"))
            }
            Err(e) => {
                error!(error = %e, template_hash = hash, "Failed to list pods by template hash");
                Err(format!("failed to find pod with template hash {hash}: {e}"))
            }
        }
    }
}
