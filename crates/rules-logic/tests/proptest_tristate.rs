// rules-logic/tests/proptest_tristate.rs
// ============================================================================
// Module: Tri-State Logic Table Property Tests
// Description: Algebraic laws of `KleeneLogic` and `BochvarLogic` across all
//              tri-state inputs.
// Purpose: Catch regressions in the hand-written truth tables.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use rules_logic::BochvarLogic;
use rules_logic::TriLogic;
use rules_logic::TriState;

fn tristate() -> impl Strategy<Value = TriState> {
    prop_oneof![Just(TriState::True), Just(TriState::False), Just(TriState::Unknown)]
}

proptest! {
    #[test]
    fn kleene_and_or_are_commutative(a in tristate(), b in tristate()) {
        let logic = rules_logic::KleeneLogic;
        prop_assert_eq!(logic.and(a, b), logic.and(b, a));
        prop_assert_eq!(logic.or(a, b), logic.or(b, a));
    }

    #[test]
    fn kleene_not_is_involutive(a in tristate()) {
        let logic = rules_logic::KleeneLogic;
        prop_assert_eq!(logic.not(logic.not(a)), a);
    }

    #[test]
    fn kleene_de_morgan_holds(a in tristate(), b in tristate()) {
        let logic = rules_logic::KleeneLogic;
        prop_assert_eq!(logic.not(logic.and(a, b)), logic.or(logic.not(a), logic.not(b)));
        prop_assert_eq!(logic.not(logic.or(a, b)), logic.and(logic.not(a), logic.not(b)));
    }

    #[test]
    fn kleene_false_annihilates_and_true_annihilates_or(a in tristate()) {
        let logic = rules_logic::KleeneLogic;
        prop_assert_eq!(logic.and(a, TriState::False), TriState::False);
        prop_assert_eq!(logic.or(a, TriState::True), TriState::True);
    }

    #[test]
    fn bochvar_unknown_is_infectious(a in tristate()) {
        let logic = BochvarLogic;
        prop_assert_eq!(logic.and(a, TriState::Unknown), TriState::Unknown);
        prop_assert_eq!(logic.or(a, TriState::Unknown), TriState::Unknown);
    }

    #[test]
    fn bochvar_and_kleene_agree_when_no_operand_is_unknown(a in tristate(), b in tristate()) {
        prop_assume!(!a.is_unknown() && !b.is_unknown());
        let kleene = rules_logic::KleeneLogic;
        let bochvar = BochvarLogic;
        prop_assert_eq!(kleene.and(a, b), bochvar.and(a, b));
        prop_assert_eq!(kleene.or(a, b), bochvar.or(a, b));
    }
}
