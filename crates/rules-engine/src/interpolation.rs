// rules-engine/src/interpolation.rs
// ============================================================================
// Module: Interpolation
// Description: Resolves `${path}` string templates and `{ref: path}` value
//              references against an evaluation context.
// Purpose: One pure function over (template, context) for every caller
//          (spec §9 design note: interpolation must round-trip on
//          literal-only templates).
// Dependencies: rules_core::condition::EvalContext, rules_logic::stringify_path_value,
//               serde_json::Value
// ============================================================================

//! ## Overview
//! Two resolution shapes appear throughout the action language (spec §3,
//! §4.4): a string may embed one or more `${path}` placeholders, and a JSON
//! value may itself be the literal object `{"ref": "path"}`, which resolves
//! to the native (unstringified) value. [`interpolate_string`] handles the
//! former; [`resolve_value`] recursively walks a JSON tree applying both.

use serde_json::Value;
use serde_json::json;

use rules_core::condition::EvalContext;
use rules_logic::stringify_path_value;

/// Replaces every `${path}` placeholder in `template` with its resolved,
/// stringified value. Unresolved paths render as `"undefined"` (spec §4.4:
/// "Unresolved references evaluate to `undefined`, producing `undefined` in
/// the consumer context"). A template with no placeholders is returned
/// unchanged.
#[must_use]
pub fn interpolate_string(template: &str, ctx: &dyn EvalContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after_marker = &rest[start + 2..];
        let Some(end) = after_marker.find('}') else {
            // Unterminated placeholder: emit the rest verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let path = &after_marker[..end];
        let rendered = ctx.resolve(path).map_or_else(|| "undefined".to_string(), |v| stringify_path_value(&v));
        out.push_str(&rendered);
        rest = &after_marker[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Returns true if `value` is a literal reference object, i.e. `{"ref": "path"}`.
fn as_ref_path(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get("ref")?.as_str()
}

/// Recursively resolves a JSON value against `ctx`:
///
/// - `{"ref": "path"}` resolves to the native value at `path` (or `Value::Null`
///   if unresolved).
/// - Strings are passed through [`interpolate_string`].
/// - Objects and arrays are resolved element-wise.
/// - Every other value (numbers, bools, null) is returned unchanged.
#[must_use]
pub fn resolve_value(value: &Value, ctx: &dyn EvalContext) -> Value {
    if let Some(path) = as_ref_path(value) {
        return ctx.resolve(path).unwrap_or(Value::Null);
    }

    match value {
        Value::String(s) => json!(interpolate_string(s, ctx)),
        Value::Array(items) => Value::Array(items.iter().map(|item| resolve_value(item, ctx)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_value(v, ctx))).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Vec<(&'static str, Value)>);

    impl EvalContext for Fixed {
        fn resolve(&self, path: &str) -> Option<Value> {
            self.0.iter().find(|(p, _)| *p == path).map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn literal_only_template_round_trips() {
        let ctx = Fixed(vec![]);
        assert_eq!(interpolate_string("no placeholders here", &ctx), "no placeholders here");
    }

    #[test]
    fn single_and_multiple_placeholders_resolve() {
        let ctx = Fixed(vec![("event.id", json!("o1")), ("var.tier", json!("vip"))]);
        assert_eq!(interpolate_string("customer:${event.id}:tier", &ctx), "customer:o1:tier");
        assert_eq!(interpolate_string("${var.tier}-${event.id}", &ctx), "vip-o1");
    }

    #[test]
    fn unresolved_placeholder_renders_undefined() {
        let ctx = Fixed(vec![]);
        assert_eq!(interpolate_string("${missing.path}", &ctx), "undefined");
    }

    #[test]
    fn ref_object_resolves_to_native_value() {
        let ctx = Fixed(vec![("var.err", json!({"message": "boom"}))]);
        let resolved = resolve_value(&json!({"ref": "var.err"}), &ctx);
        assert_eq!(resolved, json!({"message": "boom"}));
    }

    #[test]
    fn ref_recurses_through_objects_and_arrays() {
        let ctx = Fixed(vec![("event.amount", json!(200)), ("var.tier", json!("vip"))]);
        let resolved = resolve_value(
            &json!({"amount": {"ref": "event.amount"}, "tags": ["${var.tier}", "static"]}),
            &ctx,
        );
        assert_eq!(resolved, json!({"amount": 200, "tags": ["vip", "static"]}));
    }

    #[test]
    fn unresolved_ref_is_null() {
        let ctx = Fixed(vec![]);
        assert_eq!(resolve_value(&json!({"ref": "missing"}), &ctx), Value::Null);
    }
}
