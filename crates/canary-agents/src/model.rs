//! Generative model access.
//!
//! `ModelCaller` is the seam the direct analyzer depends on; `GeminiClient`
//! is the production implementation over the Gemini REST API. One call is one
//! HTTP request: retries are the caller's business (see `crate::retry`).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use coordination::resilience::parse_retry_delay;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::config::ModelEndpoint;
use crate::retry::RateLimitSignal;

/// `@type` of a retry-hint detail entry.
pub const TYPE_RETRY_INFO: &str = "type.googleapis.com/google.rpc.RetryInfo";
/// `@type` of a quota-violation detail entry.
pub const TYPE_QUOTA_FAILURE: &str = "type.googleapis.com/google.rpc.QuotaFailure";

const STATUS_RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";
const HTTP_TOO_MANY_REQUESTS: u16 = 429;

// ── Response types ───────────────────────────────────────────────────────────

/// A text fragment of a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One candidate answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

/// Successful model answer: zero or more candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl ModelResponse {
    /// Single candidate with a single text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
            }],
        }
    }

    /// All text fragments of all candidates, in order, with no separator.
    pub fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

// ── Error types ──────────────────────────────────────────────────────────────

/// One quota that was exceeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotaViolation {
    pub quota_metric: String,
    pub quota_id: String,
    /// Reported as a string by the API, occasionally as a number.
    pub quota_value: Value,
    pub quota_dimensions: BTreeMap<String, String>,
}

/// Structured detail attached to an API error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ErrorDetail {
    #[serde(rename = "type.googleapis.com/google.rpc.RetryInfo")]
    RetryInfo {
        #[serde(rename = "retryDelay", default)]
        retry_delay: String,
    },
    #[serde(rename = "type.googleapis.com/google.rpc.QuotaFailure")]
    QuotaFailure {
        #[serde(default)]
        violations: Vec<QuotaViolation>,
    },
    /// Any other detail type; kept only so the entry count is preserved.
    #[serde(other)]
    Unrecognized,
}

impl ErrorDetail {
    /// Decode a raw detail entry; anything undecodable is `Unrecognized`.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or(Self::Unrecognized)
    }
}

/// A failed model call.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The API answered with an error status.
    #[error("model API error {code} {status}: {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
        details: Vec<ErrorDetail>,
    },
    /// The request never produced a response (connect, timeout, TLS).
    #[error("model request failed: {0}")]
    Transport(String),
    /// A success status with a body that is not a model response.
    #[error("failed to decode model response: {0}")]
    Decode(String),
}

impl ModelError {
    pub fn api(code: u16, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            status: status.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Attach detail entries to an `Api` error; no-op for other variants.
    pub fn with_details(mut self, extra: Vec<ErrorDetail>) -> Self {
        if let Self::Api { details, .. } = &mut self {
            details.extend(extra);
        }
        self
    }

    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            Self::Api { details, .. } => details,
            _ => &[],
        }
    }

    /// Quota violations carried by the error, for diagnostics.
    pub fn quota_violations(&self) -> impl Iterator<Item = &QuotaViolation> {
        self.details().iter().flat_map(|d| match d {
            ErrorDetail::QuotaFailure { violations } => violations.as_slice(),
            _ => Default::default(),
        })
    }
}

impl RateLimitSignal for ModelError {
    fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Api { code, status, .. }
                if *code == HTTP_TOO_MANY_REQUESTS || status == STATUS_RESOURCE_EXHAUSTED
        )
    }

    /// First parseable, non-zero retry delay among the detail entries.
    fn retry_hint(&self) -> Option<Duration> {
        self.details().iter().find_map(|d| match d {
            ErrorDetail::RetryInfo { retry_delay } => parse_retry_delay(retry_delay)
                .ok()
                .filter(|d| !d.is_zero()),
            _ => None,
        })
    }

    fn report(&self) {
        if let Self::Api {
            code,
            status,
            message,
            ..
        } = self
        {
            error!(code, status = %status, message = %message, "Gemini API error");
        }
        if !self.is_rate_limited() {
            return;
        }
        for violation in self.quota_violations() {
            warn!(
                quota_metric = %violation.quota_metric,
                quota_id = %violation.quota_id,
                quota_value = %violation.quota_value,
                quota_dimensions = ?violation.quota_dimensions,
                "Quota violation: API rate limit exceeded"
            );
        }
    }
}

// ── Caller seam ──────────────────────────────────────────────────────────────

/// One request to a generative model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Send `segments` (in order) to `model` and return its answer.
    async fn generate(&self, model: &str, segments: &[String]) -> Result<ModelResponse, ModelError>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<Value>,
}

/// Gemini `generateContent` over REST.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(endpoint: &ModelEndpoint) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }

    fn endpoint_for(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ModelCaller for GeminiClient {
    async fn generate(&self, model: &str, segments: &[String]) -> Result<ModelResponse, ModelError> {
        let parts: Vec<Value> = segments.iter().map(|t| json!({ "text": t })).collect();
        let body = json!({ "contents": [{ "parts": parts }] });

        let resp = self
            .http
            .post(self.endpoint_for(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| ModelError::Decode(e.to_string()));
        }

        Err(match serde_json::from_str::<ApiErrorEnvelope>(&text) {
            Ok(envelope) => {
                let body = envelope.error;
                ModelError::api(
                    body.code.unwrap_or(status.as_u16()),
                    body.status,
                    body.message,
                )
                .with_details(body.details.into_iter().map(ErrorDetail::from_value).collect())
            }
            Err(_) => ModelError::api(status.as_u16(), "", text),
        })
    }
}
