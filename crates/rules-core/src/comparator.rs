// rules-core/src/comparator.rs
// ============================================================================
// Module: Comparator Evaluation
// Description: Converts a resolved context value into a tri-state outcome.
// Purpose: Give every condition predicate one shared, fail-closed comparator
//          implementation (spec §4.4 condition evaluation).
// Dependencies: rules_logic::TriState, serde_json::{Number, Value}
// ============================================================================

//! ## Overview
//! Missing or invalid data always yields [`TriState::Unknown`] rather than
//! `False`, preserving the fail-closed semantics spec §4.4 describes for
//! unresolved references. Numeric ordering is integer-only; a decimal
//! operand yields `Unknown` rather than a possibly-surprising float compare.

use serde_json::Number;
use serde_json::Value;

use rules_logic::TriState;

use crate::condition::Comparator;

/// Evaluates `comparator` between a resolved path `value` and a literal
/// `expected` value.
#[must_use]
pub fn evaluate_comparator(comparator: Comparator, value: Option<&Value>, expected: Option<&Value>) -> TriState {
    match comparator {
        Comparator::Exists => TriState::from(value.is_some_and(|v| !v.is_null())),
        Comparator::NotExists => TriState::from(!value.is_some_and(|v| !v.is_null())),
        _ => evaluate_value_comparator(comparator, value, expected),
    }
}

fn evaluate_value_comparator(comparator: Comparator, value: Option<&Value>, expected: Option<&Value>) -> TriState {
    let (Some(value), Some(expected)) = (value, expected) else { return TriState::Unknown };
    if value.is_null() {
        return TriState::Unknown;
    }

    match comparator {
        Comparator::Equals => TriState::from(value == expected),
        Comparator::NotEquals => TriState::from(value != expected),
        Comparator::GreaterThan
        | Comparator::GreaterThanOrEqual
        | Comparator::LessThan
        | Comparator::LessThanOrEqual => compare_numbers(comparator, value, expected),
        Comparator::Contains => compare_contains(value, expected),
        Comparator::InSet => compare_in_set(value, expected),
        Comparator::Exists | Comparator::NotExists => TriState::Unknown,
    }
}

fn compare_numbers(comparator: Comparator, left: &Value, right: &Value) -> TriState {
    let Some(left_num) = left.as_number() else { return TriState::Unknown };
    let Some(right_num) = right.as_number() else { return TriState::Unknown };
    let Some(ordering) = numeric_cmp(left_num, right_num) else { return TriState::Unknown };

    let result = match comparator {
        Comparator::GreaterThan => ordering.is_gt(),
        Comparator::GreaterThanOrEqual => ordering.is_ge(),
        Comparator::LessThan => ordering.is_lt(),
        Comparator::LessThanOrEqual => ordering.is_le(),
        _ => return TriState::Unknown,
    };
    TriState::from(result)
}

fn compare_contains(left: &Value, right: &Value) -> TriState {
    match (left, right) {
        (Value::String(haystack), Value::String(needle)) => TriState::from(haystack.contains(needle)),
        (Value::Array(haystack), needle) => TriState::from(haystack.contains(needle)),
        _ => TriState::Unknown,
    }
}

fn compare_in_set(value: &Value, expected: &Value) -> TriState {
    match expected {
        Value::Array(values) => TriState::from(values.contains(value)),
        _ => TriState::Unknown,
    }
}

fn numeric_cmp(left: &Number, right: &Number) -> Option<std::cmp::Ordering> {
    let left = integer_value(left)?;
    let right = integer_value(right)?;
    match (left, right) {
        (IntegerValue::Signed(left), IntegerValue::Signed(right)) => Some(left.cmp(&right)),
        (IntegerValue::Unsigned(left), IntegerValue::Unsigned(right)) => Some(left.cmp(&right)),
        (IntegerValue::Signed(left), IntegerValue::Unsigned(right)) => {
            if left < 0 {
                Some(std::cmp::Ordering::Less)
            } else {
                let left = u64::try_from(left).ok()?;
                Some(left.cmp(&right))
            }
        }
        (IntegerValue::Unsigned(left), IntegerValue::Signed(right)) => {
            if right < 0 {
                Some(std::cmp::Ordering::Greater)
            } else {
                let right = u64::try_from(right).ok()?;
                Some(left.cmp(&right))
            }
        }
    }
}

enum IntegerValue {
    Signed(i64),
    Unsigned(u64),
}

fn integer_value(value: &Number) -> Option<IntegerValue> {
    if let Some(value) = value.as_i64() {
        return Some(IntegerValue::Signed(value));
    }
    value.as_u64().map(IntegerValue::Unsigned)
}
