//! The structured decision produced by either analysis mode.

use serde::{Deserialize, Deserializer, Serialize};

use crate::extract::extract_first_object;

/// Upper bound of the confidence scale.
pub const MAX_CONFIDENCE: u8 = 100;

/// Promote/fail decision with its supporting explanation.
///
/// The wire names (`text`, `rootCause`, `remediation`, `prLink`) are the ones
/// the model is instructed to emit and the delegate returns.
///
/// `Default` is the zero value: empty narrative, `promote = false`,
/// confidence 0. It is what an unparseable model answer degrades to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Free-text explanation of the decision.
    #[serde(rename = "text", default)]
    pub narrative: String,
    /// Whether the canary should be promoted.
    #[serde(default)]
    pub promote: bool,
    /// Confidence in the decision, always within `0..=100`.
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub confidence: u8,
    /// Delegated mode only: suspected root cause.
    #[serde(rename = "rootCause", default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    /// Delegated mode only: suggested remediation.
    #[serde(rename = "remediation", default, skip_serializing_if = "Option::is_none")]
    pub remediation_summary: Option<String>,
    /// Delegated mode only: link to a change the delegate opened.
    #[serde(rename = "prLink", default, skip_serializing_if = "Option::is_none")]
    pub change_link: Option<String>,
}

impl DecisionRecord {
    pub fn new(narrative: impl Into<String>, promote: bool, confidence: i64) -> Self {
        Self {
            narrative: narrative.into(),
            promote,
            confidence: clamp_confidence(confidence),
            ..Default::default()
        }
    }

    /// Strict parse of a JSON object.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Clamp an arbitrary integer into the confidence scale.
pub fn clamp_confidence(value: i64) -> u8 {
    value.clamp(0, i64::from(MAX_CONFIDENCE)) as u8
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_confidence(raw))
}

/// Which path produced a [`ParsedDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// The whole (trimmed) text parsed as a record.
    Direct,
    /// The text only parsed after extracting its first object.
    Extracted,
    /// Neither attempt parsed; the record is the zero value.
    Unparseable,
}

/// Outcome of structuring raw model text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecision {
    /// Text reported back to the caller for auditing: the extracted object on
    /// [`DecisionSource::Extracted`], the trimmed input otherwise.
    pub raw: String,
    pub record: DecisionRecord,
    pub source: DecisionSource,
}

/// Turn raw model text into a record.
///
/// Tries a strict parse first, then one retry against the first balanced
/// object in the text. Never fails: unparseable text yields the zero-value
/// record so the caller can apply its own defaulting.
pub fn parse_model_output(text: &str) -> ParsedDecision {
    let trimmed = text.trim();

    if let Ok(record) = DecisionRecord::parse(trimmed) {
        return ParsedDecision {
            raw: trimmed.to_string(),
            record,
            source: DecisionSource::Direct,
        };
    }

    if let Some(object) = extract_first_object(trimmed) {
        if let Ok(record) = DecisionRecord::parse(object) {
            return ParsedDecision {
                raw: object.to_string(),
                record,
                source: DecisionSource::Extracted,
            };
        }
    }

    ParsedDecision {
        raw: trimmed.to_string(),
        record: DecisionRecord::default(),
        source: DecisionSource::Unparseable,
    }
}
