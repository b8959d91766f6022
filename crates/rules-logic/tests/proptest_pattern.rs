// rules-logic/tests/proptest_pattern.rs
// ============================================================================
// Module: Segmented Glob Matching Property Tests
// Description: Property tests for `matches_pattern`'s wildcard semantics.
// Purpose: Detect panics and invariant violations across wide input ranges.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use rules_logic::Separator;
use rules_logic::matches_pattern;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,8}"
}

proptest! {
    #[test]
    fn exact_key_always_matches_itself(segments in prop::collection::vec(segment(), 1..6)) {
        let key = segments.join(":");
        prop_assert!(matches_pattern(&key, &key, Separator::Colon));
    }

    #[test]
    fn all_wildcard_pattern_matches_any_key_of_equal_length(
        segments in prop::collection::vec(segment(), 1..6),
    ) {
        let key = segments.join(":");
        let pattern = vec!["*"; segments.len()].join(":");
        prop_assert!(matches_pattern(&pattern, &key, Separator::Colon));
    }

    #[test]
    fn mismatched_segment_count_never_matches(
        key_segments in prop::collection::vec(segment(), 1..6),
        pattern_segments in prop::collection::vec(segment(), 1..6),
    ) {
        prop_assume!(key_segments.len() != pattern_segments.len());
        let key = key_segments.join(":");
        let pattern = pattern_segments.join(":");
        prop_assert!(!matches_pattern(&pattern, &key, Separator::Colon));
    }

    #[test]
    fn replacing_any_single_segment_with_a_wildcard_still_matches(
        segments in prop::collection::vec(segment(), 1..6),
        index in 0usize..6,
    ) {
        prop_assume!(index < segments.len());
        let key = segments.join(":");
        let mut pattern_segments = segments.clone();
        pattern_segments[index] = "*".to_string();
        let pattern = pattern_segments.join(":");
        prop_assert!(matches_pattern(&pattern, &key, Separator::Colon));
    }

    #[test]
    fn colon_joined_key_is_one_segment_under_the_dot_separator(
        segments in prop::collection::vec(segment(), 2..4),
    ) {
        let key = segments.join(":");
        // Under the wrong separator the whole colon-joined key collapses to
        // a single dot-segment, so a multi-segment dot pattern can't match it.
        let multi_segment_pattern = vec!["*"; segments.len()].join(".");
        prop_assert!(matches_pattern("*", &key, Separator::Dot));
        prop_assert!(!matches_pattern(&multi_segment_pattern, &key, Separator::Dot));
    }
}
