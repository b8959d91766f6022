// rules-logic/src/requirement.rs
// ============================================================================
// Module: Requirement Core Types
// Description: Universal Boolean algebra over typed, tri-state predicates.
// Purpose: Define `Requirement<P>` and its tri-state evaluation, generalised from a
//          column-store requirement engine to single-context condition evaluation.
// Dependencies: crate::tristate
// ============================================================================

//! ## Overview
//! This module defines the condition tree: a composable Boolean algebra over
//! domain-specific leaf predicates. The logical operators (`And`, `Or`,
//! `Not`, `RequireGroup`) are domain-agnostic; `Predicate` is the boundary
//! where a rule's field/comparator/value leaves are injected.
//!
//! Unlike the row/batch evaluation model this tree shape is adapted from,
//! conditions here are evaluated once per stimulus against a single resolved
//! [`crate::tristate::TriState`]-producing context, so there is no `Row` or
//! bitmask execution path — only the tri-state walk used by the engine's
//! Condition Evaluator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use smallvec::SmallVec;

use crate::tristate::NoopTrace;
use crate::tristate::RequirementTrace;
use crate::tristate::TriLogic;
use crate::tristate::TriState;

// ============================================================================
// SECTION: Predicate Evaluation
// ============================================================================

/// Evaluates a single leaf predicate against a context, producing a tri-state result.
///
/// `Unknown` is returned when the predicate's referenced data (a fact,
/// event field, lookup, or context variable) did not resolve.
pub trait TriStateEval<C> {
    /// Evaluates the predicate against the supplied context.
    fn eval_tristate(&self, ctx: &C) -> TriState;
}

// ============================================================================
// SECTION: Requirement Definition
// ============================================================================

/// Universal requirement tree with domain-specific leaves.
///
/// This enum represents the core of the condition system: a composable
/// Boolean algebra that works over any domain-specific predicate type. The
/// logical operators are universal and domain-agnostic, while the
/// `Predicate` variant serves as the boundary where domain-specific
/// semantics are injected.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement<P> {
    /// Logical AND: all sub-requirements must be satisfied.
    ///
    /// Empty `And` is trivially satisfied (mathematical identity).
    And(SmallVec<[Box<Self>; 4]>),

    /// Logical OR: at least one sub-requirement must be satisfied.
    ///
    /// Empty `Or` is trivially unsatisfiable (no options available).
    Or(SmallVec<[Box<Self>; 4]>),

    /// Logical NOT: inverts the result of the sub-requirement.
    Not(Box<Self>),

    /// Group requirement: at least `min` of the sub-requirements must be satisfied.
    RequireGroup {
        /// Minimum number of sub-requirements that must be satisfied.
        min: u8,
        /// The sub-requirements to choose from.
        reqs: SmallVec<[Box<Self>; 8]>,
    },

    /// Domain-specific atomic predicate.
    Predicate(P),
}

// ============================================================================
// SECTION: Constructors
// ============================================================================

impl<P> Requirement<P> {
    /// Builds an `And` requirement from a list of sub-requirements.
    #[must_use]
    pub fn and(reqs: Vec<Self>) -> Self {
        Self::And(reqs.into_iter().map(Box::new).collect())
    }

    /// Builds an `Or` requirement from a list of sub-requirements.
    #[must_use]
    pub fn or(reqs: Vec<Self>) -> Self {
        Self::Or(reqs.into_iter().map(Box::new).collect())
    }

    /// Builds a `Not` requirement negating the given sub-requirement.
    #[must_use]
    pub fn negate(req: Self) -> Self {
        Self::Not(Box::new(req))
    }

    /// Builds a `RequireGroup` requirement requiring at least `min` of `reqs`.
    #[must_use]
    pub fn require_group(min: u8, reqs: Vec<Self>) -> Self {
        Self::RequireGroup { min, reqs: reqs.into_iter().map(Box::new).collect() }
    }

    /// Builds a leaf `Predicate` requirement.
    #[must_use]
    pub const fn predicate(predicate: P) -> Self {
        Self::Predicate(predicate)
    }

    /// Visits every leaf predicate in the tree, in left-to-right order.
    pub fn for_each_predicate<'a, F: FnMut(&'a P)>(&'a self, visit: &mut F) {
        match self {
            Self::Predicate(predicate) => visit(predicate),
            Self::Not(inner) => inner.for_each_predicate(visit),
            Self::And(reqs) | Self::Or(reqs) => {
                for req in reqs {
                    req.for_each_predicate(visit);
                }
            }
            Self::RequireGroup { reqs, .. } => {
                for req in reqs {
                    req.for_each_predicate(visit);
                }
            }
        }
    }

    // ========================================================================
    // SECTION: Tri-State Evaluation
    // ========================================================================

    /// Evaluates this requirement with tri-state semantics.
    pub fn eval_tristate<C, L>(&self, ctx: &C, logic: &L) -> TriState
    where
        P: TriStateEval<C>,
        L: TriLogic,
    {
        let mut trace = NoopTrace;
        self.eval_tristate_with_trace(ctx, logic, &mut trace)
    }

    /// Evaluates this requirement with tri-state semantics and a trace hook.
    pub fn eval_tristate_with_trace<C, L, T>(&self, ctx: &C, logic: &L, trace: &mut T) -> TriState
    where
        P: TriStateEval<C>,
        L: TriLogic,
        T: RequirementTrace<P>,
    {
        match self {
            Self::Predicate(predicate) => {
                let result = predicate.eval_tristate(ctx);
                trace.on_predicate_evaluated(predicate, result);
                result
            }
            Self::Not(requirement) => {
                logic.not(requirement.eval_tristate_with_trace(ctx, logic, trace))
            }
            Self::And(requirements) => {
                let mut acc = TriState::True;
                for req in requirements {
                    acc = logic.and(acc, req.eval_tristate_with_trace(ctx, logic, trace));
                    if acc == TriState::False {
                        // Short-circuit: AND can never recover from a definite failure.
                        return TriState::False;
                    }
                }
                acc
            }
            Self::Or(requirements) => {
                let mut acc = TriState::False;
                for req in requirements {
                    acc = logic.or(acc, req.eval_tristate_with_trace(ctx, logic, trace));
                    if acc == TriState::True {
                        return TriState::True;
                    }
                }
                acc
            }
            Self::RequireGroup { min, reqs } => {
                let mut satisfied = 0usize;
                let mut unknown = 0usize;
                for req in reqs {
                    match req.eval_tristate_with_trace(ctx, logic, trace) {
                        TriState::True => satisfied += 1,
                        TriState::Unknown => unknown += 1,
                        TriState::False => {}
                    }
                }
                logic.require_group(
                    *min,
                    crate::tristate::GroupCounts { satisfied, unknown, total: reqs.len() },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tristate::KleeneLogic;

    #[derive(Debug, Clone, PartialEq)]
    struct Fixed(TriState);

    impl TriStateEval<()> for Fixed {
        fn eval_tristate(&self, _ctx: &()) -> TriState {
            self.0
        }
    }

    #[test]
    fn and_short_circuits_on_false() {
        let req = Requirement::and(vec![
            Requirement::predicate(Fixed(TriState::False)),
            Requirement::predicate(Fixed(TriState::Unknown)),
        ]);
        assert_eq!(req.eval_tristate(&(), &KleeneLogic), TriState::False);
    }

    #[test]
    fn or_short_circuits_on_true() {
        let req = Requirement::or(vec![
            Requirement::predicate(Fixed(TriState::True)),
            Requirement::predicate(Fixed(TriState::Unknown)),
        ]);
        assert_eq!(req.eval_tristate(&(), &KleeneLogic), TriState::True);
    }

    #[test]
    fn empty_and_is_true_empty_or_is_false() {
        let empty_and: Requirement<Fixed> = Requirement::and(vec![]);
        let empty_or: Requirement<Fixed> = Requirement::or(vec![]);
        assert_eq!(empty_and.eval_tristate(&(), &KleeneLogic), TriState::True);
        assert_eq!(empty_or.eval_tristate(&(), &KleeneLogic), TriState::False);
    }

    #[test]
    fn require_group_threshold() {
        let req = Requirement::require_group(
            2,
            vec![
                Requirement::predicate(Fixed(TriState::True)),
                Requirement::predicate(Fixed(TriState::True)),
                Requirement::predicate(Fixed(TriState::False)),
            ],
        );
        assert_eq!(req.eval_tristate(&(), &KleeneLogic), TriState::True);
    }
}
