// rules-core/src/condition.rs
// ============================================================================
// Module: Condition Predicates
// Description: The leaf predicate type plugged into `Requirement<ConditionPredicate>`.
// Purpose: Define what a single rule condition compares and how.
// Dependencies: rules_logic::Requirement, serde_json::Value
// ============================================================================

//! ## Overview
//! A rule's `conditions` field (spec §3) is a `Requirement<ConditionPredicate>`
//! tree: the Boolean algebra (`And`/`Or`/`Not`/`RequireGroup`) lives in
//! `rules-logic`; this module supplies the domain-specific leaf — a dotted
//! path into the resolved evaluation context, a comparator, and an optional
//! literal value to compare against.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use rules_logic::Requirement;
use rules_logic::TriState;
use rules_logic::requirement::TriStateEval;

use crate::comparator::evaluate_comparator;

// ============================================================================
// SECTION: Comparator
// ============================================================================

/// Comparison operator applied between a resolved path value and `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// The path resolves to a present, non-null value.
    Exists,
    /// The path does not resolve, or resolves to null.
    NotExists,
    /// Value equality.
    Equals,
    /// Value inequality.
    NotEquals,
    /// Numeric greater-than.
    GreaterThan,
    /// Numeric greater-than-or-equal.
    GreaterThanOrEqual,
    /// Numeric less-than.
    LessThan,
    /// Numeric less-than-or-equal.
    LessThanOrEqual,
    /// String or array containment.
    Contains,
    /// Membership in an expected set.
    InSet,
}

// ============================================================================
// SECTION: Condition Predicate
// ============================================================================

/// A single leaf condition: `path <comparator> value`.
///
/// `path` addresses the evaluation context using the same dotted-segment
/// namespaces as action interpolation (`event.*`, `trigger.*`, `fact.*`,
/// `var.*`, `lookup.*`, `context.*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionPredicate {
    /// Dotted path into the evaluation context.
    pub path: String,
    /// The comparison to apply.
    pub comparator: Comparator,
    /// The literal value to compare against. Unused by `Exists`/`NotExists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ConditionPredicate {
    /// Builds a new condition predicate.
    #[must_use]
    pub fn new(path: impl Into<String>, comparator: Comparator, value: Option<Value>) -> Self {
        Self { path: path.into(), comparator, value }
    }
}

/// A rule's condition tree: the universal Boolean algebra over [`ConditionPredicate`] leaves.
pub type ConditionTree = Requirement<ConditionPredicate>;

// ============================================================================
// SECTION: Context Resolution
// ============================================================================

/// Anything that can resolve a dotted condition path to a value.
///
/// The Condition Evaluator's full dispatch context (event, facts, variables,
/// lookups, baselines) and a temporal matcher's bare event context both
/// implement this; `ConditionPredicate`'s tri-state evaluation is generic
/// over it so there is exactly one comparator implementation for both.
pub trait EvalContext {
    /// Resolves `path` to a value, or `None` if it does not resolve.
    fn resolve(&self, path: &str) -> Option<Value>;
}

impl<C: EvalContext> TriStateEval<C> for ConditionPredicate {
    fn eval_tristate(&self, ctx: &C) -> TriState {
        let resolved = ctx.resolve(&self.path);
        evaluate_comparator(self.comparator, resolved.as_ref(), self.value.as_ref())
    }
}
