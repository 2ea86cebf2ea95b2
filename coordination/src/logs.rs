//! Combined stable/canary log context.
//!
//! Both analysis modes consume one text block with the stable segment first
//! and the canary segment second, each introduced by a fixed marker line.

/// Marker introducing the stable segment.
pub const STABLE_MARKER: &str = "--- STABLE LOGS ---";
/// Marker introducing the canary segment.
pub const CANARY_MARKER: &str = "--- CANARY LOGS ---";

/// Build the combined context handed to the analyzers.
pub fn combine_logs(stable: &str, canary: &str) -> String {
    format!("{STABLE_MARKER}\n{stable}\n\n{CANARY_MARKER}\n{canary}")
}

/// The two segments of a combined context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLogs<'a> {
    pub stable: &'a str,
    pub canary: &'a str,
}

/// Split a combined context back into its segments.
///
/// The stable segment is everything between the two markers and the canary
/// segment everything after the canary marker, untrimmed. When either marker
/// is missing, or the canary marker does not follow the stable one, the whole
/// context is returned as stable logs with an empty canary segment.
pub fn split_logs(context: &str) -> SplitLogs<'_> {
    let degraded = SplitLogs {
        stable: context,
        canary: "",
    };

    let (Some(stable_idx), Some(canary_idx)) =
        (context.find(STABLE_MARKER), context.find(CANARY_MARKER))
    else {
        return degraded;
    };

    let stable_start = stable_idx + STABLE_MARKER.len();
    if canary_idx < stable_start {
        return degraded;
    }

    SplitLogs {
        stable: &context[stable_start..canary_idx],
        canary: &context[canary_idx + CANARY_MARKER.len()..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_places_markers_in_order() {
        let combined = combine_logs("s1\ns2", "c1");
        assert_eq!(
            combined,
            "--- STABLE LOGS ---\ns1\ns2\n\n--- CANARY LOGS ---\nc1"
        );
    }

    #[test]
    fn split_returns_exact_substrings() {
        let split = split_logs("--- STABLE LOGS ---\nstable line\n\n--- CANARY LOGS ---\ncanary line");
        assert_eq!(split.stable, "\nstable line\n\n");
        assert_eq!(split.canary, "\ncanary line");
    }

    #[test]
    fn split_inverts_combine_up_to_separators() {
        let combined = combine_logs("GET /health 200", "GET /health 500");
        let split = split_logs(&combined);
        assert_eq!(split.stable.trim(), "GET /health 200");
        assert_eq!(split.canary.trim(), "GET /health 500");
    }

    #[test]
    fn missing_canary_marker_treats_all_as_stable() {
        let context = "--- STABLE LOGS ---\nonly stable";
        let split = split_logs(context);
        assert_eq!(split.stable, context);
        assert_eq!(split.canary, "");
    }

    #[test]
    fn missing_stable_marker_treats_all_as_stable() {
        let context = "--- CANARY LOGS ---\nonly canary";
        let split = split_logs(context);
        assert_eq!(split.stable, context);
        assert_eq!(split.canary, "");
    }

    #[test]
    fn no_markers_treats_all_as_stable() {
        let split = split_logs("plain text");
        assert_eq!(split.stable, "plain text");
        assert_eq!(split.canary, "");
    }

    #[test]
    fn reversed_markers_are_treated_as_degraded_input() {
        let context = "--- CANARY LOGS ---\nc\n--- STABLE LOGS ---\ns";
        let split = split_logs(context);
        assert_eq!(split.stable, context);
        assert_eq!(split.canary, "");
    }
}
