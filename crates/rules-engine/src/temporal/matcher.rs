// rules-engine/src/temporal/matcher.rs
// ============================================================================
// Module: Event Matcher
// Description: The per-step predicate every temporal pattern matches events against.
// Purpose: Give all four temporal matchers one shared "does this event count"
//          test: a dot-segmented topic glob plus an optional condition tree.
// Dependencies: crate::context::EventOnlyContext, rules_core::ConditionTree,
//               rules_logic::{KleeneLogic, Separator, matches_pattern}
// ============================================================================

//! ## Overview
//! A temporal pattern's "event matcher" (spec §4.3: sequence steps, an
//! absence's `after`/`expected`, a count/aggregate's event matcher) is a
//! topic glob plus optional extra conditions evaluated against the event's
//! own payload only — no facts, variables, or lookups are available inside
//! temporal matching (spec §4.3's `now()` injection point is the only other
//! external dependency).

use rules_core::ConditionTree;
use rules_core::Event;
use rules_logic::KleeneLogic;
use rules_logic::Requirement;
use rules_logic::Separator;
use rules_logic::matches_pattern;

use crate::context::EventOnlyContext;

/// A topic glob plus optional extra conditions an event must satisfy.
#[derive(Debug, Clone)]
pub struct EventMatcher {
    /// Dot-segmented topic glob, e.g. `order.*`.
    pub topic: String,
    /// Extra conditions evaluated against the event's payload, AND-combined
    /// with the topic match. `None` means the topic match alone suffices.
    pub conditions: Option<ConditionTree>,
}

impl EventMatcher {
    /// Builds a matcher with no extra conditions.
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), conditions: None }
    }

    /// Builds a matcher requiring both a topic match and the given conditions.
    #[must_use]
    pub fn with_conditions(topic: impl Into<String>, conditions: ConditionTree) -> Self {
        Self { topic: topic.into(), conditions: Some(conditions) }
    }

    /// Returns true if `event` satisfies this matcher.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !matches_pattern(&self.topic, &event.topic, Separator::Dot) {
            return false;
        }
        let Some(conditions) = &self.conditions else { return true };
        let ctx = EventOnlyContext::new(&event.data);
        conditions.eval_tristate(&ctx, &KleeneLogic).is_true()
    }
}

/// Extracts a temporal grouping key from an event's payload.
///
/// Missing values yield the empty string (spec §4.3: "missing values yield
/// the empty string; numbers and primitives are stringified"); `group_by ==
/// None` always yields the empty string, i.e. every event shares one group.
#[must_use]
pub fn group_key(event: &Event, group_by: Option<&str>) -> String {
    let Some(path) = group_by else { return String::new() };
    rules_logic::get_path(&event.data, path).map_or_else(String::new, rules_logic::stringify_path_value)
}

/// Convenience: builds a trivial `Requirement::and(vec![])`-style condition
/// tree helper for tests exercising [`EventMatcher::with_conditions`].
#[cfg(test)]
pub(crate) fn always_true() -> ConditionTree {
    Requirement::and(vec![])
}
