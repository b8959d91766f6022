// rules-engine/src/executor.rs
// ============================================================================
// Module: Action Executor
// Description: Recursive interpreter of the action language.
// Purpose: Implement spec §4.4 exactly: isolated per-action failure,
//          interpolation/ref resolution, and conditional/for_each/try_catch
//          control flow with scoped variable bindings.
// Dependencies: crate::{context, interpolation, fact_store, clock, interfaces},
//               rules_core::{RuleAction, ConditionTree}
// ============================================================================

//! ## Overview
//! `ActionExecutor::execute` runs one action list against an
//! [`ExecutionState`] and returns one [`ActionResult`] per top-level action.
//! Every action is isolated: a failure sets `success: false` on its own
//! result and the next sibling still runs (spec §4.4). `conditional`,
//! `for_each`, and `try_catch` recurse into nested action lists, threading
//! the same mutable variable scope and tracer through.

use std::collections::HashMap;
use std::sync::Arc;

use rules_core::CallServiceSpec;
use rules_core::CatchClause;
use rules_core::ConditionTree;
use rules_core::CorrelationId;
use rules_core::Event;
use rules_core::EventId;
use rules_core::LogLevel;
use rules_core::RuleAction;
use rules_core::TimerSpec;
use rules_core::condition::EvalContext;
use rules_logic::KleeneLogic;
use serde_json::Value;

use crate::clock::SharedClock;
use crate::context::EngineContext;
use crate::context::Stimulus;
use crate::fact_store::FactStore;
use crate::interfaces::DiagnosticLevel;
use crate::interfaces::DiagnosticSink;
use crate::interfaces::Service;
use crate::interfaces::ServiceError;
use crate::interpolation::interpolate_string;
use crate::interpolation::resolve_value;

/// Fixed error string spec §4.4/§7 requires when a `conditional` action runs
/// without a configured condition evaluator.
pub const CONDITION_EVALUATOR_MISSING: &str = "ConditionEvaluator is required for conditional actions";

// ============================================================================
// SECTION: Host Collaborators
// ============================================================================

/// An emitted event, handed off to the host (spec §5: `emit_event` is a
/// suspension point). The orchestrator is responsible for feeding this back
/// into the pipeline; the executor itself does not recurse into dispatch.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Accepts one rule-emitted event.
    async fn emit(&self, event: Event);
}

/// A resolved `set_timer` request, ready for the scheduler.
#[derive(Debug, Clone)]
pub struct TimerRequest {
    /// Timer name.
    pub name: String,
    /// Delay in milliseconds.
    pub delay_ms: u64,
    /// Payload delivered with the timer's expiration stimulus.
    pub data: Value,
    /// Correlation id propagated from the triggering stimulus.
    pub correlation_id: Option<CorrelationId>,
}

/// Timer scheduling hand-off (spec §5: `set_timer` is a suspension point).
#[async_trait::async_trait]
pub trait TimerManager: Send + Sync {
    /// Arms a timer.
    async fn set_timer(&self, request: TimerRequest);
    /// Deregisters a timer by name.
    async fn cancel_timer(&self, name: String);
}

// ============================================================================
// SECTION: Tracing
// ============================================================================

/// Tracing callbacks fired for every executed action, including those nested
/// inside `conditional`, `for_each`, and `try_catch` (spec §4.4).
pub trait ActionTracer: Send + Sync {
    /// Called immediately before an action runs, with its resolved input.
    fn on_action_started(&self, index: usize, action_type: &str, resolved_input: &Value) {
        let _ = (index, action_type, resolved_input);
    }
    /// Called after an action succeeds.
    fn on_action_completed(&self, index: usize, action_type: &str, output: &Value, duration_ms: u64) {
        let _ = (index, action_type, output, duration_ms);
    }
    /// Called after an action fails.
    fn on_action_failed(&self, index: usize, action_type: &str, error: &str, duration_ms: u64) {
        let _ = (index, action_type, error, duration_ms);
    }
}

/// An [`ActionTracer`] that discards every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActionTracer;

impl ActionTracer for NullActionTracer {}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Which branch a `conditional` or `try_catch` action actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchExecuted {
    /// A `conditional`'s `then` branch, or a `try_catch`'s `try` list.
    Then,
    /// A `conditional`'s `else` branch, or a `try_catch`'s `catch` clause.
    Else,
    /// A `conditional` with no matching branch and no `else`.
    None,
}

/// The outcome of running one top-level (or nested) action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// The action's type tag (`"set_fact"`, `"conditional"`, ...).
    pub action_type: String,
    /// Whether the action completed without error.
    pub success: bool,
    /// The action's return value, present on success.
    pub result: Option<Value>,
    /// The error message, present on failure.
    pub error: Option<String>,
}

impl ActionResult {
    fn ok(action_type: &str, result: Value) -> Self {
        Self { action_type: action_type.to_string(), success: true, result: Some(result), error: None }
    }

    fn err(action_type: &str, error: impl Into<String>) -> Self {
        Self { action_type: action_type.to_string(), success: false, result: None, error: Some(error.into()) }
    }
}

fn action_type_name(action: &RuleAction) -> &'static str {
    match action {
        RuleAction::SetFact { .. } => "set_fact",
        RuleAction::DeleteFact { .. } => "delete_fact",
        RuleAction::EmitEvent { .. } => "emit_event",
        RuleAction::SetTimer { .. } => "set_timer",
        RuleAction::CancelTimer { .. } => "cancel_timer",
        RuleAction::CallService { .. } => "call_service",
        RuleAction::Log { .. } => "log",
        RuleAction::Conditional { .. } => "conditional",
        RuleAction::ForEach { .. } => "for_each",
        RuleAction::TryCatch { .. } => "try_catch",
    }
}

// ============================================================================
// SECTION: Execution State
// ============================================================================

/// Everything one `execute` call needs besides the action list itself.
///
/// `variables` is mutable and threaded through nested calls so `for_each`
/// and `try_catch` bindings are visible to the bodies they scope, and
/// removed again once that scope ends.
pub struct ExecutionState<'a> {
    /// The triggering stimulus (event/fact/timer payload) plus correlation id.
    pub stimulus: &'a Stimulus,
    /// The shared fact store `set_fact`/`delete_fact` mutate.
    pub facts: &'a FactStore,
    /// Currently resolved lookups, addressable as `lookup.<name>`.
    pub lookups: &'a HashMap<String, Value>,
    /// Currently known baseline values, addressable as `baseline.<name>`.
    pub baselines: &'a HashMap<String, Value>,
    /// Scoped variable bindings, addressable as `var.<name>`.
    pub variables: HashMap<String, Value>,
}

impl<'a> ExecutionState<'a> {
    /// Builds a fresh execution state with no variable bindings yet.
    #[must_use]
    pub fn new(stimulus: &'a Stimulus, facts: &'a FactStore, lookups: &'a HashMap<String, Value>, baselines: &'a HashMap<String, Value>) -> Self {
        Self { stimulus, facts, lookups, baselines, variables: HashMap::new() }
    }

    fn eval_context(&self) -> EngineContext<'_> {
        EngineContext::new(self.stimulus, self.facts, &self.variables, self.lookups, self.baselines)
    }
}

// ============================================================================
// SECTION: Action Executor
// ============================================================================

/// Recursive interpreter of the action language.
pub struct ActionExecutor {
    clock: SharedClock,
    services: HashMap<String, Arc<dyn Service>>,
    event_sink: Arc<dyn EventSink>,
    timer_manager: Arc<dyn TimerManager>,
    diagnostics: Arc<dyn DiagnosticSink>,
    supports_conditionals: bool,
}

impl ActionExecutor {
    /// Builds an executor with the full collaborator set, including
    /// conditional-action support.
    #[must_use]
    pub fn new(
        clock: SharedClock,
        services: HashMap<String, Arc<dyn Service>>,
        event_sink: Arc<dyn EventSink>,
        timer_manager: Arc<dyn TimerManager>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self { clock, services, event_sink, timer_manager, diagnostics, supports_conditionals: true }
    }

    /// Disables `conditional` support, so every `conditional` action fails
    /// with [`CONDITION_EVALUATOR_MISSING`] (spec §4.4/§7). Intended for
    /// hosts that embed the executor without wiring a condition evaluator.
    #[must_use]
    pub fn without_condition_evaluator(mut self) -> Self {
        self.supports_conditionals = false;
        self
    }

    /// Executes an action list, returning one result per top-level action.
    pub async fn execute(
        &self,
        actions: &[RuleAction],
        state: &mut ExecutionState<'_>,
        tracer: &dyn ActionTracer,
    ) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            let started_at = self.clock.now_ms();
            let action_type = action_type_name(action);
            let resolved_input = self.resolved_input_preview(action, state);
            tracer.on_action_started(index, action_type, &resolved_input);

            let result = Box::pin(self.run_one(action, state, tracer)).await;

            let duration_ms = self.clock.now_ms().saturating_sub(started_at);
            match &result.error {
                Some(error) => tracer.on_action_failed(index, action_type, error, duration_ms),
                None => tracer.on_action_completed(index, action_type, result.result.as_ref().unwrap_or(&Value::Null), duration_ms),
            }
            results.push(result);
        }
        results
    }

    fn resolved_input_preview(&self, action: &RuleAction, state: &ExecutionState<'_>) -> Value {
        let ctx = state.eval_context();
        match action {
            RuleAction::SetFact { key, value } => {
                serde_json::json!({"key": interpolate_string(key, &ctx), "value": resolve_value(value, &ctx)})
            }
            RuleAction::DeleteFact { key } => serde_json::json!({"key": interpolate_string(key, &ctx)}),
            RuleAction::EmitEvent { topic, data } => {
                serde_json::json!({"topic": interpolate_string(topic, &ctx), "data": resolve_value(data, &ctx)})
            }
            RuleAction::Log { message, .. } => serde_json::json!({"message": interpolate_string(message, &ctx)}),
            _ => Value::Null,
        }
    }

    async fn run_one(&self, action: &RuleAction, state: &mut ExecutionState<'_>, tracer: &dyn ActionTracer) -> ActionResult {
        match action {
            RuleAction::SetFact { key, value } => self.run_set_fact(key, value, state),
            RuleAction::DeleteFact { key } => self.run_delete_fact(key, state),
            RuleAction::EmitEvent { topic, data } => self.run_emit_event(topic, data, state).await,
            RuleAction::SetTimer { spec } => self.run_set_timer(spec, state).await,
            RuleAction::CancelTimer { name } => self.run_cancel_timer(name, state).await,
            RuleAction::CallService { spec } => self.run_call_service(spec, state).await,
            RuleAction::Log { level, message } => self.run_log(*level, message, state),
            RuleAction::Conditional { conditions, then_actions, else_actions } => {
                Box::pin(self.run_conditional(conditions, then_actions, else_actions.as_deref(), state, tracer)).await
            }
            RuleAction::ForEach { collection, as_var, actions, max_iterations } => {
                Box::pin(self.run_for_each(collection, as_var, actions, *max_iterations, state, tracer)).await
            }
            RuleAction::TryCatch { try_actions, catch, finally } => {
                Box::pin(self.run_try_catch(try_actions, catch.as_ref(), finally.as_deref(), state, tracer)).await
            }
        }
    }

    fn run_set_fact(&self, key: &str, value: &Value, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved_key = interpolate_string(key, &ctx);
        let resolved_value = resolve_value(value, &ctx);
        let fact = state.facts.set(resolved_key, resolved_value, "rule");
        ActionResult::ok("set_fact", serde_json::to_value(fact).unwrap_or(Value::Null))
    }

    fn run_delete_fact(&self, key: &str, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved_key = interpolate_string(key, &ctx);
        let deleted = state.facts.delete(&resolved_key);
        ActionResult::ok("delete_fact", Value::Bool(deleted))
    }

    async fn run_emit_event(&self, topic: &str, data: &Value, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved_topic = interpolate_string(topic, &ctx);
        let resolved_data = resolve_value(data, &ctx);
        let event = Event::new(
            EventId::new(format!("evt-{}", self.clock.now_ms())),
            resolved_topic,
            resolved_data,
            self.clock.now_ms(),
            "rule",
            state.stimulus.correlation_id.clone(),
        );
        let emitted = serde_json::to_value(&event).unwrap_or(Value::Null);
        self.event_sink.emit(event).await;
        ActionResult::ok("emit_event", emitted)
    }

    async fn run_set_timer(&self, spec: &TimerSpec, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved_name = interpolate_string(&spec.name, &ctx);
        let resolved_data = resolve_value(&spec.data, &ctx);
        match rules_logic::parse_duration_ms(&spec.delay) {
            Ok(delay_ms) => {
                self.timer_manager
                    .set_timer(TimerRequest {
                        name: resolved_name.clone(),
                        delay_ms,
                        data: resolved_data,
                        correlation_id: state.stimulus.correlation_id.clone(),
                    })
                    .await;
                ActionResult::ok("set_timer", serde_json::json!({"name": resolved_name, "delayMs": delay_ms}))
            }
            Err(error) => ActionResult::err("set_timer", error.to_string()),
        }
    }

    async fn run_cancel_timer(&self, name: &str, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved_name = interpolate_string(name, &ctx);
        self.timer_manager.cancel_timer(resolved_name.clone()).await;
        ActionResult::ok("cancel_timer", Value::String(resolved_name))
    }

    async fn run_call_service(&self, spec: &CallServiceSpec, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved_args = resolve_value(&spec.args, &ctx);
        let Some(service) = self.services.get(&spec.service) else {
            return ActionResult::err("call_service", ServiceError::ServiceNotFound(spec.service.clone()).to_string());
        };
        match service.call(&spec.method, resolved_args).await {
            Ok(value) => ActionResult::ok("call_service", value),
            Err(error) => ActionResult::err("call_service", error.to_string()),
        }
    }

    fn run_log(&self, level: LogLevel, message: &str, state: &ExecutionState<'_>) -> ActionResult {
        let ctx = state.eval_context();
        let resolved = interpolate_string(message, &ctx);
        let diagnostic_level = match level {
            LogLevel::Debug | LogLevel::Info => DiagnosticLevel::Info,
            LogLevel::Warn | LogLevel::Error => DiagnosticLevel::Warn,
        };
        self.diagnostics.record(diagnostic_level, "rule_log", &resolved);
        ActionResult::ok("log", Value::String(resolved))
    }

    async fn run_conditional(
        &self,
        conditions: &ConditionTree,
        then_actions: &[RuleAction],
        else_actions: Option<&[RuleAction]>,
        state: &mut ExecutionState<'_>,
        tracer: &dyn ActionTracer,
    ) -> ActionResult {
        if !self.supports_conditionals {
            return ActionResult::err("conditional", CONDITION_EVALUATOR_MISSING);
        }

        let condition_met = {
            let ctx = state.eval_context();
            conditions.eval_tristate(&ctx, &KleeneLogic).is_true()
        };

        let (branch, results) = if condition_met {
            (BranchExecuted::Then, self.execute(then_actions, state, tracer).await)
        } else if let Some(else_actions) = else_actions {
            (BranchExecuted::Else, self.execute(else_actions, state, tracer).await)
        } else {
            (BranchExecuted::None, Vec::new())
        };

        let branch_name = match branch {
            BranchExecuted::Then => "then",
            BranchExecuted::Else => "else",
            BranchExecuted::None => "none",
        };
        ActionResult::ok(
            "conditional",
            serde_json::json!({
                "conditionMet": condition_met,
                "branchExecuted": branch_name,
                "results": results_to_json(&results),
            }),
        )
    }

    async fn run_for_each(
        &self,
        collection: &Value,
        as_var: &str,
        actions: &[RuleAction],
        max_iterations: Option<u32>,
        state: &mut ExecutionState<'_>,
        tracer: &dyn ActionTracer,
    ) -> ActionResult {
        let resolved_collection = {
            let ctx = state.eval_context();
            resolve_value(collection, &ctx)
        };
        let Value::Array(items) = resolved_collection else {
            return ActionResult::err("for_each", "collection must be an array");
        };

        let index_var = format!("{as_var}_index");
        let limit = max_iterations.map_or(items.len(), |m| items.len().min(m as usize));
        let mut all_results = Vec::new();

        for (i, item) in items.into_iter().take(limit).enumerate() {
            state.variables.insert(as_var.to_string(), item);
            state.variables.insert(index_var.clone(), serde_json::json!(i));
            all_results.push(self.execute(actions, state, tracer).await);
        }
        state.variables.remove(as_var);
        state.variables.remove(&index_var);

        ActionResult::ok(
            "for_each",
            serde_json::json!({"iterations": all_results.len(), "results": all_results.iter().map(|r| results_to_json(r)).collect::<Vec<_>>()}),
        )
    }

    async fn run_try_catch(
        &self,
        try_actions: &[RuleAction],
        catch: Option<&CatchClause>,
        finally: Option<&[RuleAction]>,
        state: &mut ExecutionState<'_>,
        tracer: &dyn ActionTracer,
    ) -> ActionResult {
        let try_results = self.execute_until_failure(try_actions, state, tracer).await;
        let first_failure = try_results.iter().find(|r| !r.success).and_then(|r| r.error.clone());

        let (branch, catch_results) = match (&first_failure, catch) {
            (Some(error), Some(catch)) => {
                let as_var = catch.as_var.clone().unwrap_or_else(|| "error".to_string());
                state.variables.insert(as_var.clone(), serde_json::json!({"message": error}));
                let results = self.execute(&catch.actions, state, tracer).await;
                state.variables.remove(&as_var);
                (BranchExecuted::Else, results)
            }
            _ => (BranchExecuted::Then, Vec::new()),
        };

        let finally_results = match finally {
            Some(finally) => self.execute(finally, state, tracer).await,
            None => Vec::new(),
        };

        let branch_name = if first_failure.is_some() { "catch" } else { "try" };
        let _ = branch;
        ActionResult::ok(
            "try_catch",
            serde_json::json!({
                "branchExecuted": branch_name,
                "error": first_failure,
                "tryResults": results_to_json(&try_results),
                "catchResults": results_to_json(&catch_results),
                "finallyResults": results_to_json(&finally_results),
            }),
        )
    }

    /// Runs `actions` in order, stopping at (but including) the first failure.
    async fn execute_until_failure(&self, actions: &[RuleAction], state: &mut ExecutionState<'_>, tracer: &dyn ActionTracer) -> Vec<ActionResult> {
        let mut results = Vec::new();
        for action in actions {
            let started_at = self.clock.now_ms();
            let action_type = action_type_name(action);
            let resolved_input = self.resolved_input_preview(action, state);
            tracer.on_action_started(results.len(), action_type, &resolved_input);

            let result = Box::pin(self.run_one(action, state, tracer)).await;
            let duration_ms = self.clock.now_ms().saturating_sub(started_at);
            let failed = !result.success;
            match &result.error {
                Some(error) => tracer.on_action_failed(results.len(), action_type, error, duration_ms),
                None => tracer.on_action_completed(results.len(), action_type, result.result.as_ref().unwrap_or(&Value::Null), duration_ms),
            }
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }
}

fn results_to_json(results: &[ActionResult]) -> Vec<Value> {
    results
        .iter()
        .map(|r| serde_json::json!({"actionType": r.action_type, "success": r.success, "result": r.result, "error": r.error}))
        .collect()
}
