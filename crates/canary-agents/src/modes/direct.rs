//! Direct model analyzer: one prompt, one (retried) model call, one record.

use std::sync::Arc;

use coordination::decision::{parse_model_output, DecisionSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::ModelCaller;
use crate::modes::errors::AnalysisError;
use crate::modes::{AnalysisInput, AnalysisOutput};
use crate::prompts;
use crate::retry::RetryController;

/// Analyzes logs by asking a generative model directly.
#[derive(Clone)]
pub struct DirectAnalyzer {
    model: Arc<dyn ModelCaller>,
    retry: RetryController,
}

impl DirectAnalyzer {
    pub fn new(model: Arc<dyn ModelCaller>, retry: RetryController) -> Self {
        Self { model, retry }
    }

    /// Run the analysis.
    ///
    /// Output that cannot be structured, even after extracting its first
    /// object, is not an error: the zero-value record comes back with the
    /// raw text so the caller can apply its own defaulting.
    pub async fn analyze(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let segments = vec![prompts::build_request_text(
            input.extra_guidance.as_deref(),
            &input.log_context,
        )];
        debug!(
            model = %input.model,
            prompt_version = prompts::PROMPT_VERSION,
            request_len = segments[0].len(),
            "Sending analysis request to model"
        );

        let response = self
            .retry
            .execute(cancel, || self.model.generate(&input.model, &segments))
            .await?;

        let parsed = parse_model_output(&response.text());
        match parsed.source {
            DecisionSource::Direct => {}
            DecisionSource::Extracted => {
                debug!("Model wrapped its answer in prose; extracted first object")
            }
            DecisionSource::Unparseable => warn!(
                raw_len = parsed.raw.len(),
                "Model output could not be parsed; returning zero-value decision"
            ),
        }

        Ok(AnalysisOutput {
            raw: parsed.raw,
            record: parsed.record,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use coordination::decision::DecisionRecord;

    use super::*;
    use crate::model::{ErrorDetail, MockModelCaller, ModelError, ModelResponse};
    use crate::modes::errors::ErrorKind;

    fn input() -> AnalysisInput {
        AnalysisInput::from_segments("gemini-2.0-flash", "stable ok", "canary ok")
    }

    fn analyzer(mock: MockModelCaller) -> DirectAnalyzer {
        DirectAnalyzer::new(Arc::new(mock), RetryController::new(3))
    }

    #[tokio::test]
    async fn sends_single_segment_with_instructions_and_logs() {
        let mut mock = MockModelCaller::new();
        mock.expect_generate()
            .withf(|model, segments| {
                model == "gemini-2.0-flash"
                    && segments.len() == 1
                    && segments[0].starts_with("Analyze what was this canary behavior")
                    && segments[0].contains("Additional context: be strict")
                    && segments[0].ends_with("--- CANARY LOGS ---\ncanary ok")
            })
            .times(1)
            .returning(|_, _| {
                Ok(ModelResponse::from_text(
                    r#"{"text":"ok","promote":true,"confidence":100}"#,
                ))
            });

        let out = analyzer(mock)
            .analyze(
                &input().with_extra_guidance("be strict"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.record, DecisionRecord::new("ok", true, 100));
        assert_eq!(out.raw, r#"{"text":"ok","promote":true,"confidence":100}"#);
    }

    #[tokio::test]
    async fn prose_wrapped_answer_is_extracted() {
        let mut mock = MockModelCaller::new();
        mock.expect_generate().returning(|_, _| {
            Ok(ModelResponse::from_text(
                r#"Here is the result: {"text":"ok","promote":true,"confidence":80} thanks"#,
            ))
        });

        let out = analyzer(mock)
            .analyze(&input(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.raw, r#"{"text":"ok","promote":true,"confidence":80}"#);
        assert_eq!(out.record.confidence, 80);
        assert!(out.record.promote);
    }

    #[tokio::test]
    async fn unparseable_answer_is_zero_record_without_error() {
        let mut mock = MockModelCaller::new();
        mock.expect_generate()
            .returning(|_, _| Ok(ModelResponse::from_text("I am unable to decide.")));

        let out = analyzer(mock)
            .analyze(&input(), &CancellationToken::new())
            .await
            .expect("unparseable output is not an error");
        assert_eq!(out.record, DecisionRecord::default());
        assert_eq!(out.raw, "I am unable to decide.");
    }

    #[tokio::test]
    async fn permanent_model_error_is_not_retried() {
        let mut mock = MockModelCaller::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _| Err(ModelError::api(403, "PERMISSION_DENIED", "bad key")));

        let err = analyzer(mock)
            .analyze(&input(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermanentUpstream);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_call_is_retried_until_success() {
        let mut mock = MockModelCaller::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(ModelError::api(429, "RESOURCE_EXHAUSTED", "quota").with_details(vec![
                    ErrorDetail::RetryInfo {
                        retry_delay: "2s".into(),
                    },
                ]))
            });
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ModelResponse::from_text(
                    r#"{"text":"bad","promote":false,"confidence":90}"#,
                ))
            });

        let started = tokio::time::Instant::now();
        let out = analyzer(mock)
            .analyze(&input(), &CancellationToken::new())
            .await
            .unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
        assert!(!out.record.promote);
        assert_eq!(out.record.confidence, 90);
    }
}
