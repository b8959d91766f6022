// rules-core/src/rule.rs
// ============================================================================
// Module: Rule Data Model
// Description: The `Rule` record: trigger, conditions, actions, and lifecycle fields.
// Purpose: Define the unit of dispatch the Rule Index indexes and the
//          orchestrator runs (spec §3).
// Dependencies: crate::{action, condition, identifiers, trigger}
// ============================================================================

//! ## Overview
//! A rule binds one [`crate::trigger::Trigger`] to a [`crate::condition::ConditionTree`]
//! and an ordered [`crate::action::RuleAction`] list. Activity is computed,
//! never stored: a rule is active iff its own `enabled` flag is set and
//! (when it references a group) that group is also enabled.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::action::RuleAction;
use crate::condition::ConditionTree;
use crate::identifiers::GroupId;
use crate::identifiers::RuleId;
use crate::lookup::LookupRequirement;
use crate::trigger::Trigger;

/// A registered rule: trigger, conditions, actions, and lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier.
    pub id: RuleId,
    /// Display name.
    pub name: String,
    /// Dispatch priority; higher runs first among simultaneous matches.
    pub priority: i32,
    /// Whether this rule, considered alone, may be active.
    pub enabled: bool,
    /// Free-form classification tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Group this rule belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    /// The stimulus this rule reacts to.
    pub trigger: Trigger,
    /// Data Resolver requirements resolved before conditions are evaluated.
    #[serde(default)]
    pub requirements: Vec<LookupRequirement>,
    /// Conditions evaluated against the resolved context before dispatch.
    pub conditions: ConditionTree,
    /// Ordered actions run when conditions hold.
    pub actions: Vec<RuleAction>,
    /// Monotonically assigned version, bumped by the engine on every registration.
    pub version: u64,
    /// Creation timestamp, monotonic milliseconds.
    pub created_at: u64,
    /// Last-update timestamp, monotonic milliseconds.
    pub updated_at: u64,
}

impl Rule {
    /// Returns whether this rule is active given its group's enabled state.
    ///
    /// Pass `None` when the rule has no group, or when its group has been
    /// deleted (deleting a group clears `rule.group`, so this should not
    /// normally occur with `Some`).
    #[must_use]
    pub fn is_active(&self, group_enabled: Option<bool>) -> bool {
        self.enabled && group_enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules_logic::Requirement;

    fn sample_rule() -> Rule {
        Rule {
            id: RuleId::new("r1"),
            name: "sample".to_string(),
            priority: 0,
            enabled: true,
            tags: BTreeSet::new(),
            group: Some(GroupId::new("g1")),
            trigger: Trigger::Event { topic: "order.paid".to_string() },
            requirements: vec![],
            conditions: Requirement::and(vec![]),
            actions: vec![],
            version: 1,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn active_requires_both_own_and_group_enabled() {
        let mut rule = sample_rule();
        assert!(rule.is_active(Some(true)));
        assert!(!rule.is_active(Some(false)));

        rule.enabled = false;
        assert!(!rule.is_active(Some(true)));
    }

    #[test]
    fn ungrouped_rule_ignores_group_state() {
        let rule = Rule { group: None, ..sample_rule() };
        assert!(rule.is_active(None));
    }
}
