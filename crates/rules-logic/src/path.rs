// rules-logic/src/path.rs
// ============================================================================
// Module: Dotted Path Resolution
// Description: Resolves dotted nested-field paths against `serde_json::Value`.
// Purpose: Back the `${path}` / `{ref: path}` interpolation syntax used by
//          condition predicates and action payload templates.
// Dependencies: serde_json::Value
// ============================================================================

//! ## Overview
//! Facts, events, and action contexts are all represented as
//! [`serde_json::Value`] trees. A dotted path such as `payload.amount` or
//! `user.address.zip` walks successive object keys; array indices are not
//! supported since rule data never addresses sequences by position.
//!
//! A path that cannot be fully resolved (a missing key, or an attempt to
//! index into a non-object) returns `None` rather than an error: the caller
//! (the Condition Evaluator) turns a `None` into [`crate::tristate::TriState::Unknown`].

use serde_json::Value;

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

/// Resolves a dotted path (e.g. `"payload.amount"`) against a JSON value.
///
/// An empty path returns the root value unchanged. Each segment must name an
/// object key; indexing into arrays or scalars fails the lookup.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }

    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ============================================================================
// SECTION: Stringification
// ============================================================================

/// Renders a resolved JSON value for string interpolation.
///
/// Strings are emitted verbatim (unquoted); every other JSON type uses its
/// canonical JSON text form. `Value::Null` renders as an empty string so a
/// missing optional field does not print the literal text `null` into an
/// interpolated message.
#[must_use]
pub fn stringify_path_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_object_path() {
        let value = json!({"payload": {"amount": 42, "currency": "USD"}});
        assert_eq!(get_path(&value, "payload.amount"), Some(&json!(42)));
        assert_eq!(get_path(&value, "payload.currency"), Some(&json!("USD")));
    }

    #[test]
    fn empty_path_returns_root() {
        let value = json!({"a": 1});
        assert_eq!(get_path(&value, ""), Some(&value));
    }

    #[test]
    fn missing_key_or_non_object_segment_is_none() {
        let value = json!({"payload": {"amount": 42}});
        assert_eq!(get_path(&value, "payload.missing"), None);
        assert_eq!(get_path(&value, "payload.amount.nested"), None);
        assert_eq!(get_path(&value, "missing.nested"), None);
    }

    #[test]
    fn stringify_variants() {
        assert_eq!(stringify_path_value(&json!("hi")), "hi");
        assert_eq!(stringify_path_value(&json!(42)), "42");
        assert_eq!(stringify_path_value(&json!(null)), "");
        assert_eq!(stringify_path_value(&json!(true)), "true");
    }
}
