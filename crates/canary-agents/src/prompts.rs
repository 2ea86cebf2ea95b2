//! Instruction text for the direct model analyzer.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever the instruction content
//! changes, so logged analyses can be traced back to the wording that
//! produced them.

use coordination::logs::{CANARY_MARKER, STABLE_MARKER};

/// Prompt version. Bump on any instruction change.
pub const PROMPT_VERSION: &str = "1.1.0";

/// Task statement, required output fields and the default-to-promote policy.
pub fn base_instructions() -> String {
    format!(
        "Analyze what was this canary behavior based on these logs, compare the stable version \
         vs the canary version. \
         Write only a json text with these entries and nothing else: \
         one named 'text' with your analysis text; \
         one named 'promote' with true or false; \
         one named 'confidence' with a number from 0 to 100 representing your confidence in \
         the decision. \
         The stable version logs start with '{STABLE_MARKER}' and the canary version logs start \
         with '{CANARY_MARKER}'. \
         In case that you cannot make a determination due to lack of information, default to \
         promote: true."
    )
}

/// Full instruction block, with operator guidance appended verbatim.
pub fn build_instructions(extra_guidance: Option<&str>) -> String {
    let mut instructions = base_instructions();
    if let Some(extra) = extra_guidance.filter(|s| !s.is_empty()) {
        instructions.push_str("\n\nAdditional context: ");
        instructions.push_str(extra);
    }
    instructions
}

/// The single text segment sent to the model.
pub fn build_request_text(extra_guidance: Option<&str>, log_context: &str) -> String {
    format!("{}\n\n{}", build_instructions(extra_guidance), log_context)
}
