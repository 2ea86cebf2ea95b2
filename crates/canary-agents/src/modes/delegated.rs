//! Delegated analyzer: hand the investigation to the remote diagnostic agent.
//!
//! There is no fallback to the direct analyzer on any failure here. An
//! operator who configured delegation gets either the agent's answer or an
//! error, never a silently lower-fidelity analysis.

use std::sync::Arc;

use coordination::decision::DecisionRecord;
use coordination::logs::split_logs;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::a2a::{DelegateClient, DelegateResponse};
use crate::modes::errors::AnalysisError;
use crate::modes::{AnalysisInput, AnalysisOutput};

#[derive(Clone)]
pub struct DelegatedAnalyzer {
    client: Arc<dyn DelegateClient>,
}

impl DelegatedAnalyzer {
    pub fn new(client: Arc<dyn DelegateClient>) -> Self {
        Self { client }
    }

    /// Probe the agent, then ask it to analyze `input`.
    ///
    /// `input` must already carry a namespace and target; the dispatcher
    /// checks that before calling here.
    pub async fn analyze(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let health = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            health = self.client.health_check() => health,
        };
        if let Err(e) = health {
            error!(error = %e, "Kubernetes Agent health check failed");
            return Err(AnalysisError::DelegateUnreachable(e));
        }

        let logs = split_logs(&input.log_context);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            response = self.client.analyze(&input.namespace, &input.target, logs.stable, logs.canary) => response,
        };
        let response = response.map_err(|e| {
            error!(error = %e, "Failed to analyze with Kubernetes Agent");
            AnalysisError::Delegate(e)
        })?;

        if let Some(link) = response.change_link() {
            info!(pr_link = link, "Agent created a PR with fix");
        }

        let record = record_from_response(&response);
        let raw = raw_json(&record);
        info!(
            promote = record.promote,
            confidence = record.confidence,
            has_change_link = record.change_link.is_some(),
            "Analysis completed via Kubernetes Agent"
        );
        Ok(AnalysisOutput { raw, record })
    }
}

fn record_from_response(response: &DelegateResponse) -> DecisionRecord {
    DecisionRecord {
        root_cause: Some(response.root_cause.clone()),
        remediation_summary: Some(response.remediation.clone()),
        change_link: response.change_link().map(str::to_string),
        ..DecisionRecord::new(&response.analysis, response.promote, response.confidence)
    }
}

/// Audit text for delegated results: the record as a flat JSON object.
fn raw_json(record: &DecisionRecord) -> String {
    let mut body = Map::new();
    body.insert("text".into(), json!(record.narrative));
    body.insert("promote".into(), json!(record.promote));
    body.insert("confidence".into(), json!(record.confidence));
    body.insert(
        "rootCause".into(),
        json!(record.root_cause.as_deref().unwrap_or_default()),
    );
    body.insert(
        "remediation".into(),
        json!(record.remediation_summary.as_deref().unwrap_or_default()),
    );
    if let Some(link) = &record.change_link {
        body.insert("prLink".into(), json!(link));
    }
    Value::Object(body).to_string()
}
