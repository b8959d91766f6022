// rules-core/src/trigger.rs
// ============================================================================
// Module: Trigger
// Description: The stimulus shape a rule binds to.
// Purpose: Define the tagged variant consumed by the Rule Index's forward
//          indexes (spec §3, §4.2).
// Dependencies: crate::identifiers::PatternId
// ============================================================================

//! ## Overview
//! A trigger is the one thing a rule reacts to: a fact key pattern, an event
//! topic pattern, a timer name, or a registered temporal pattern firing a
//! match. Fact and timer patterns use `:` as the segment separator; event
//! topics use `.`. Both accept the single-segment wildcard `*`.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::PatternId;

/// The stimulus shape a rule binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when a fact matching `pattern` changes.
    Fact {
        /// Colon-segmented glob, e.g. `customer:*:age`.
        pattern: String,
    },
    /// Fires when an event matching `topic` is emitted.
    Event {
        /// Dot-segmented glob, e.g. `order.*`.
        topic: String,
    },
    /// Fires when a timer named `name` expires.
    Timer {
        /// The exact timer name (no wildcard matching; spec §4.2 indexes
        /// timer triggers in the same two-tier exact/wildcard shape as
        /// facts, so a glob is still accepted here).
        name: String,
    },
    /// Fires when a registered temporal pattern produces a match.
    Temporal {
        /// Identifier of the registered temporal pattern.
        pattern: PatternId,
    },
}

impl Trigger {
    /// Returns the pattern/name/topic string used for index lookups, or
    /// `None` for [`Trigger::Temporal`] (which is keyed by [`PatternId`] instead).
    #[must_use]
    pub fn key_pattern(&self) -> Option<&str> {
        match self {
            Self::Fact { pattern } | Self::Event { topic: pattern } | Self::Timer { name: pattern } => {
                Some(pattern)
            }
            Self::Temporal { .. } => None,
        }
    }

    /// Returns true if this trigger's pattern contains a wildcard segment.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.key_pattern().is_some_and(|p| p.contains('*'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_trigger_reports_wildcard() {
        let t = Trigger::Fact { pattern: "customer:*:age".to_string() };
        assert!(t.is_wildcard());
        let t = Trigger::Fact { pattern: "customer:1:age".to_string() };
        assert!(!t.is_wildcard());
    }

    #[test]
    fn temporal_trigger_has_no_key_pattern() {
        let t = Trigger::Temporal { pattern: PatternId::new("p1") };
        assert_eq!(t.key_pattern(), None);
    }
}
