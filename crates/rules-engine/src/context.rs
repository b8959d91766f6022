// rules-engine/src/context.rs
// ============================================================================
// Module: Evaluation Context
// Description: Resolves `${path}`/`{ref: path}` namespaces against the live
//              engine state for one stimulus.
// Purpose: Give the Condition Evaluator, Action Executor, and Data Resolver
//          one shared implementation of spec §4.4's dotted-path namespaces.
// Dependencies: crate::fact_store::FactStore, rules_core::condition::EvalContext,
//               rules_logic::{get_path, stringify_path_value}
// ============================================================================

//! ## Overview
//! Every `${...}` template and `{ref: ...}` object resolves a dotted path
//! rooted at one of six namespaces: `event`/`trigger` (aliases for the
//! stimulus payload), `fact`, `var`, `lookup`, and `context`. Fact keys are
//! colon-segmented, not dot-segmented, so the first `.` after `fact.` (if
//! any) separates the fact key from a nested path into that fact's value —
//! the same convention applies to `lookup.<name>.<nested>`: `name` has no
//! dots, so the first `.` splits it from a nested path into the looked-up
//! value.

use std::collections::HashMap;

use serde_json::Value;

use rules_core::CorrelationId;
use rules_core::condition::EvalContext;
use rules_logic::get_path;

use crate::fact_store::FactStore;

fn split_first_dot(rest: &str) -> (&str, &str) {
    rest.split_once('.').map_or((rest, ""), |(head, tail)| (head, tail))
}

/// The stimulus payload and its declared kind, shared by every context built
/// for one pipeline pass.
#[derive(Debug, Clone)]
pub struct Stimulus {
    /// The trigger payload (`Event.data`, a `Fact`, or a timer payload), as JSON.
    pub data: Value,
    /// Caller-supplied correlation id propagated through this stimulus.
    pub correlation_id: Option<CorrelationId>,
}

impl Stimulus {
    /// Builds a stimulus context from an arbitrary JSON payload.
    #[must_use]
    pub fn new(data: Value, correlation_id: Option<CorrelationId>) -> Self {
        Self { data, correlation_id }
    }
}

/// Read-only context used to evaluate an [`EventMatcher`](crate::temporal::matcher::EventMatcher)
/// against one raw event, with no facts/variables/lookups available.
///
/// Temporal matchers only ever see the triggering event itself (spec §4.3).
pub struct EventOnlyContext<'a> {
    data: &'a Value,
}

impl<'a> EventOnlyContext<'a> {
    /// Builds a context rooted at `data` (an event's payload).
    #[must_use]
    pub fn new(data: &'a Value) -> Self {
        Self { data }
    }
}

impl EvalContext for EventOnlyContext<'_> {
    fn resolve(&self, path: &str) -> Option<Value> {
        let (namespace, rest) = split_first_dot(path);
        match namespace {
            "event" | "trigger" => get_path(self.data, rest).cloned(),
            _ => None,
        }
    }
}

/// The full evaluation context for one stimulus pass through the pipeline:
/// the stimulus payload, the fact store, scoped variable bindings, resolved
/// lookups, and baseline values (spec §4.4/§4.5).
pub struct EngineContext<'a> {
    stimulus: &'a Stimulus,
    facts: &'a FactStore,
    variables: &'a HashMap<String, Value>,
    lookups: &'a HashMap<String, Value>,
    baselines: &'a HashMap<String, Value>,
}

impl<'a> EngineContext<'a> {
    /// Builds a context for one pipeline pass.
    #[must_use]
    pub fn new(
        stimulus: &'a Stimulus,
        facts: &'a FactStore,
        variables: &'a HashMap<String, Value>,
        lookups: &'a HashMap<String, Value>,
        baselines: &'a HashMap<String, Value>,
    ) -> Self {
        Self { stimulus, facts, variables, lookups, baselines }
    }

    fn resolve_fact(&self, rest: &str) -> Option<Value> {
        let (key, nested) = split_first_dot(rest);
        let fact = self.facts.get(key)?;
        get_path(&fact.value, nested).cloned()
    }

    fn resolve_named(map: &HashMap<String, Value>, rest: &str) -> Option<Value> {
        let (name, nested) = split_first_dot(rest);
        let value = map.get(name)?;
        get_path(value, nested).cloned()
    }

    fn resolve_context(&self, rest: &str) -> Option<Value> {
        match rest {
            "correlationId" => self.stimulus.correlation_id.as_ref().map(|id| Value::String(id.to_string())),
            _ => None,
        }
    }
}

impl EvalContext for EngineContext<'_> {
    fn resolve(&self, path: &str) -> Option<Value> {
        let (namespace, rest) = split_first_dot(path);
        match namespace {
            "event" | "trigger" => get_path(&self.stimulus.data, rest).cloned(),
            "fact" => self.resolve_fact(rest),
            "var" => Self::resolve_named(self.variables, rest),
            "lookup" => Self::resolve_named(self.lookups, rest),
            "baseline" => Self::resolve_named(self.baselines, rest),
            "context" => self.resolve_context(rest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::interfaces::NullDiagnosticSink;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn event_only_context_resolves_event_and_trigger_alias() {
        let data = json!({"orderId": "o1", "amount": 200});
        let ctx = EventOnlyContext::new(&data);
        assert_eq!(ctx.resolve("event.orderId"), Some(json!("o1")));
        assert_eq!(ctx.resolve("trigger.amount"), Some(json!(200)));
        assert_eq!(ctx.resolve("fact.k"), None);
    }

    #[test]
    fn engine_context_resolves_every_namespace() {
        let facts = FactStore::new("test", Arc::new(ManualClock::new(0)), Arc::new(NullDiagnosticSink));
        facts.set("customer:1:profile", json!({"age": 30}), "system");
        let stimulus = Stimulus::new(json!({"amount": 200}), Some(CorrelationId::new("c1")));
        let mut variables = HashMap::new();
        variables.insert("err".to_string(), json!({"message": "boom"}));
        let lookups = HashMap::new();
        let baselines = HashMap::new();

        let ctx = EngineContext::new(&stimulus, &facts, &variables, &lookups, &baselines);
        assert_eq!(ctx.resolve("event.amount"), Some(json!(200)));
        assert_eq!(ctx.resolve("fact.customer:1:profile.age"), Some(json!(30)));
        assert_eq!(ctx.resolve("var.err.message"), Some(json!("boom")));
        assert_eq!(ctx.resolve("context.correlationId"), Some(json!("c1")));
        assert_eq!(ctx.resolve("lookup.missing"), None);
    }
}
