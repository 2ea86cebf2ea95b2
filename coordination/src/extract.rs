//! Recovery of a decision object from free-form model output.
//!
//! Models asked to "write only JSON" still wrap the object in prose or code
//! fences often enough that a strict parse is not sufficient on its own.
//! Extraction here is a plain balanced-brace scan, not a JSON tokenizer:
//! braces inside string literals are counted like any other brace.

/// Return the first top-level `{ ... }` block in `text`.
///
/// Scanning starts at the first `{` and ends where the nesting depth first
/// returns to zero. Returns `None` when there is no opening brace or when the
/// first object is never closed. Only the first object is ever returned, even
/// if several follow one another.
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    // Both braces are ASCII, so these are valid char boundaries.
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}
