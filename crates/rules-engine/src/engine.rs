// rules-engine/src/engine.rs
// ============================================================================
// Module: Rule Engine Orchestrator
// Description: Drives the dispatch-and-execution pipeline for one stimulus at
//              a time, wiring the Fact Store, Rule Index, temporal matchers,
//              Data Resolver, Action Executor, Trace Collector, and Debug
//              Controller into a single embeddable handle.
// Purpose: Implement spec §4 "control flow for one stimulus", §5's ordering
//          guarantees, and §6's embedding contract.
// Dependencies: crate::{clock, context, debug, executor, fact_store,
//               interfaces, resolver, rule_index, temporal, trace},
//               rules_core::*, rules_logic::{KleeneLogic, parse_duration_ms}
// ============================================================================

//! ## Overview
//! [`RuleEngine`] is the only type most embedders construct directly. It owns
//! every other component and runs a cooperative, single-threaded pipeline: a
//! stimulus (fact change, event, timer fire, or temporal match) is looked up
//! in the [`crate::rule_index::RuleIndex`], each candidate rule's
//! requirements are resolved, its conditions evaluated, and its actions run.
//! Fact mutations and emitted events produced along the way are not
//! processed inline — they are queued and drained breadth-first after the
//! triggering rule's action list returns, preserving spec §5's ordering
//! guarantees without recursion depth proportional to chain length.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::time::Duration;

use rules_core::CorrelationId;
use rules_core::Event;
use rules_core::EventId;
use rules_core::Fact;
use rules_core::Group;
use rules_core::GroupId;
use rules_core::PatternId;
use rules_core::Rule;
use rules_core::RuleId;
use rules_core::TimerSpec as ActionTimerSpec;
use rules_core::Trigger;
use rules_core::ValidationError;
use rules_logic::KleeneLogic;
use serde_json::Value;
use thiserror::Error;

use crate::clock::SharedClock;
use crate::clock::SystemClock;
use crate::context::EngineContext;
use crate::context::Stimulus;
use crate::debug::BreakpointAction;
use crate::debug::BreakpointHit;
use crate::debug::BreakpointSpec;
use crate::debug::DebugController;
use crate::debug::DebugError;
use crate::debug::Snapshot;
use crate::executor::ActionExecutor;
use crate::executor::ActionResult;
use crate::executor::ActionTracer;
use crate::executor::EventSink;
use crate::executor::ExecutionState;
use crate::executor::TimerManager;
use crate::executor::TimerRequest;
use crate::fact_store::ChangeListener;
use crate::fact_store::FactStore;
use crate::interfaces::AuditSink;
use crate::interfaces::BaselineProvider;
use crate::interfaces::DiagnosticLevel;
use crate::interfaces::DiagnosticSink;
use crate::interfaces::NullDiagnosticSink;
use crate::interfaces::PersistenceError;
use crate::interfaces::RulePersistence;
use crate::interfaces::Service;
use crate::resolver::DataResolver;
use crate::resolver::ResolveOutcome;
use crate::resolver::ResolverError;
use crate::rule_index::RuleIndex;
use crate::rule_index::RuleIndexError;
use crate::temporal::AbsencePattern;
use crate::temporal::AggregatePattern;
use crate::temporal::CountPattern;
use crate::temporal::SequencePattern;
use crate::temporal::SequencePatternError;
use crate::temporal::TemporalEventOutcome;
use crate::temporal::TemporalMatchers;
use crate::trace::DebugTraceEntry;
use crate::trace::NewTraceEntry;
use crate::trace::TraceCollector;
use crate::trace::TraceEntryType;
use crate::trace::TraceSubscriber;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by the orchestrator's public embedding-contract methods.
///
/// Internal layers never leak raw strings across this boundary (spec §7):
/// every sub-component's own error type is wrapped here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A public operation was attempted after `stop()` (spec §7 row 2).
    #[error("engine is not running")]
    NotRunning,
    /// Rule/group input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A Rule Index operation failed.
    #[error(transparent)]
    RuleIndex(#[from] RuleIndexError),
    /// A Data Resolver requirement with `on_error: fail` did not resolve.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// A Debug Controller operation failed.
    #[error(transparent)]
    Debug(#[from] DebugError),
    /// A persistence adapter call failed outside the debounced background path.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// A temporal pattern failed validation at registration.
    #[error("invalid temporal pattern: {0}")]
    InvalidTemporalPattern(#[from] SequencePatternError),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Construction-time options for [`RuleEngine`] (spec §6 "Configuration options").
pub struct EngineOptions {
    /// Display name for the engine's Fact Store.
    pub name: String,
    /// Clock used throughout the engine; override with [`crate::clock::ManualClock`] in tests.
    pub clock: SharedClock,
    /// Persistence adapter for rules and groups, if durability is wanted.
    pub persistence: Option<Arc<dyn RulePersistence>>,
    /// Debounce window for the Rule Index's background saves.
    pub debounce_ms: u64,
    /// Sink for internal diagnostics (listener panics, background save failures).
    pub diagnostics: Arc<dyn DiagnosticSink>,
    /// Whether the Trace Collector records entries at all.
    pub trace_enabled: bool,
    /// Trace Collector ring capacity.
    pub trace_max_entries: usize,
    /// Optional external Fact Store change listener, composed with the
    /// engine's own internal dispatch hook onto the same single slot.
    pub on_fact_change: Option<ChangeListener>,
    /// Audit sink for action-level audit records; defaults to a no-op.
    pub audit: Arc<dyn AuditSink>,
    /// Baseline statistics provider; defaults to a no-op.
    pub baseline: Arc<dyn BaselineProvider>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            clock: Arc::new(SystemClock::default()),
            persistence: None,
            debounce_ms: 500,
            diagnostics: Arc::new(NullDiagnosticSink),
            trace_enabled: false,
            trace_max_entries: 10_000,
            on_fact_change: None,
            audit: Arc::new(crate::interfaces::NoopAuditSink),
            baseline: Arc::new(crate::interfaces::NoopBaselineProvider),
        }
    }
}

// ============================================================================
// SECTION: Pending stimulus queue
// ============================================================================

/// Work queued by rule actions (or temporal matches) for processing after
/// the current top-level stimulus's rule candidates have all run (spec §5:
/// "events emitted by rule A are enqueued... processed only after A's
/// top-level action list completes").
enum PendingStimulus {
    Fact(String),
    Event(Event),
    Timer { name: String, data: Value, correlation_id: Option<CorrelationId> },
    Temporal { pattern_id: PatternId, data: Value, correlation_id: Option<CorrelationId> },
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

struct EngineShared {
    clock: SharedClock,
    diagnostics: Arc<dyn DiagnosticSink>,
    fact_store: FactStore,
    rule_index: RuleIndex,
    temporal: Mutex<TemporalMatchers>,
    resolver: DataResolver,
    executor: ActionExecutor,
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    trace: TraceCollector,
    debug: DebugController,
    audit: Arc<dyn AuditSink>,
    baseline: Arc<dyn BaselineProvider>,
    queue: Mutex<VecDeque<PendingStimulus>>,
    timer_generation: Mutex<HashMap<String, u64>>,
    draining: std::sync::atomic::AtomicBool,
    running: std::sync::atomic::AtomicBool,
}

/// The embeddable forward-chaining rules engine with temporal pattern matching.
///
/// Cloning a [`RuleEngine`] is cheap: it shares one `Arc<EngineShared>`, so
/// every clone observes the same Fact Store, Rule Index, and temporal state.
#[derive(Clone)]
pub struct RuleEngine {
    inner: Arc<EngineShared>,
}

/// Bridges [`ActionExecutor`]'s trace callbacks into the Trace Collector and
/// Debug Controller for one rule's action list.
struct RuleTracer<'a> {
    trace: &'a TraceCollector,
    debug: &'a DebugController,
    fact_store: &'a FactStore,
    diagnostics: &'a Arc<dyn DiagnosticSink>,
    rule_id: RuleId,
    rule_name: String,
    correlation_id: Option<CorrelationId>,
}

impl RuleTracer<'_> {
    fn emit(&self, entry_type: TraceEntryType, details: Value, duration_ms: Option<u64>) {
        let mut entry = NewTraceEntry::new(entry_type)
            .with_correlation(self.correlation_id.clone())
            .with_rule(self.rule_id.clone(), self.rule_name.clone())
            .with_details(details);
        if let Some(duration_ms) = duration_ms {
            entry = entry.with_duration(duration_ms);
        }
        let recorded = self.trace.record(entry);
        let hits = self.debug.dispatch(&recorded);
        apply_breakpoint_hits(hits, self.debug, self.fact_store, self.trace, self.diagnostics);
    }
}

impl ActionTracer for RuleTracer<'_> {
    fn on_action_started(&self, index: usize, action_type: &str, resolved_input: &Value) {
        self.emit(
            TraceEntryType::ActionStarted,
            serde_json::json!({"index": index, "actionType": action_type, "input": resolved_input}),
            None,
        );
    }

    fn on_action_completed(&self, index: usize, action_type: &str, output: &Value, duration_ms: u64) {
        self.emit(
            TraceEntryType::ActionCompleted,
            serde_json::json!({"index": index, "actionType": action_type, "output": output}),
            Some(duration_ms),
        );
    }

    fn on_action_failed(&self, index: usize, action_type: &str, error: &str, duration_ms: u64) {
        self.emit(
            TraceEntryType::ActionFailed,
            serde_json::json!({"index": index, "actionType": action_type, "error": error}),
            Some(duration_ms),
        );
    }
}

/// Hands emitted events off to the engine's pending-stimulus queue rather
/// than processing them inline (spec §5 ordering guarantee 2).
struct QueuedEventSink {
    queue: std::sync::Weak<Mutex<VecDeque<PendingStimulus>>>,
}

#[async_trait::async_trait]
impl EventSink for QueuedEventSink {
    async fn emit(&self, event: Event) {
        if let Some(queue) = self.queue.upgrade() {
            queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push_back(PendingStimulus::Event(event));
        }
    }
}

/// Schedules real timer fires by spawning a sleep that hands a
/// [`PendingStimulus::Timer`] back to the engine when (and only when) no
/// later `set_timer`/`cancel_timer` for the same name has superseded it.
struct EngineTimerManager {
    engine: std::sync::Weak<EngineShared>,
}

#[async_trait::async_trait]
impl TimerManager for EngineTimerManager {
    async fn set_timer(&self, request: TimerRequest) {
        let Some(engine) = self.engine.upgrade() else { return };
        let generation = {
            let mut generations =
                engine.timer_generation.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let slot = generations.entry(request.name.clone()).or_insert(0);
            *slot += 1;
            *slot
        };
        let weak = self.engine.clone();
        let name = request.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;
            let Some(engine) = weak.upgrade() else { return };
            let still_current = {
                let generations =
                    engine.timer_generation.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                generations.get(&name).copied() == Some(generation)
            };
            if !still_current {
                return;
            }
            engine.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push_back(
                PendingStimulus::Timer { name, data: request.data, correlation_id: request.correlation_id },
            );
            RuleEngine { inner: engine }.drain().await;
        });
    }

    async fn cancel_timer(&self, name: String) {
        let Some(engine) = self.engine.upgrade() else { return };
        let mut generations = engine.timer_generation.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *generations.entry(name).or_insert(0) += 1;
    }
}

impl RuleEngine {
    /// Builds a running engine from `options`.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        let EngineOptions {
            name,
            clock,
            persistence,
            debounce_ms,
            diagnostics,
            trace_enabled,
            trace_max_entries,
            on_fact_change,
            audit,
            baseline,
        } = options;

        let queue: Arc<Mutex<VecDeque<PendingStimulus>>> = Arc::new(Mutex::new(VecDeque::new()));
        let fact_store = FactStore::new(name, clock.clone(), Arc::clone(&diagnostics));
        let queue_for_listener = Arc::downgrade(&queue);
        fact_store.set_listener(Box::new(move |change: &rules_core::FactChange| {
            if let Some(queue) = queue_for_listener.upgrade() {
                queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push_back(PendingStimulus::Fact(change.key.clone()));
            }
            if let Some(external) = &on_fact_change {
                external(change);
            }
        }));

        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<EngineShared>| {
            let event_sink = Arc::new(QueuedEventSink { queue: Arc::downgrade(&queue) });
            let timer_manager = Arc::new(EngineTimerManager { engine: weak.clone() });
            let executor = ActionExecutor::new(
                clock.clone(),
                HashMap::new(),
                event_sink,
                timer_manager,
                Arc::clone(&diagnostics),
            );
            EngineShared {
                resolver: DataResolver::new(clock.clone()),
                rule_index: RuleIndex::new(clock.clone(), persistence, debounce_ms, Arc::clone(&diagnostics)),
                temporal: Mutex::new(TemporalMatchers::new(clock.clone())),
                trace: TraceCollector::new(clock.clone(), trace_enabled, trace_max_entries, Arc::clone(&diagnostics)),
                debug: DebugController::new(clock.clone()),
                clock,
                diagnostics,
                fact_store,
                executor,
                services: RwLock::new(HashMap::new()),
                audit,
                baseline,
                queue: Mutex::new(VecDeque::new()),
                timer_generation: Mutex::new(HashMap::new()),
                draining: std::sync::atomic::AtomicBool::new(false),
                running: std::sync::atomic::AtomicBool::new(true),
            }
        });

        // The listener and timer manager captured `queue`/`weak` before
        // `inner` existed; move any already-queued fact keys (there are
        // none yet) aside and adopt the real queue going forward.
        drop(queue);
        Self { inner }
    }

    fn require_running(&self) -> Result<(), EngineError> {
        if self.inner.running.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::NotRunning)
        }
    }

    // ========================================================================
    // SECTION: Lifecycle
    // ========================================================================

    /// Restores rules and groups from the configured persistence adapter (if
    /// any) and marks the engine running.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if the adapter's `load` call fails.
    pub async fn start(&self) -> Result<(), EngineError> {
        self.inner.rule_index.restore().await?;
        self.inner.running.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    /// Flushes any pending persistence save, cancels all armed timers, and
    /// marks the engine stopped. Subsequent public operations fail with
    /// [`EngineError::NotRunning`] until `start()` is called again.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if the final `persist` call fails.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.inner.rule_index.persist().await?;
        self.inner
            .timer_generation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values_mut()
            .for_each(|generation| *generation += 1);
        self.inner.running.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    /// Immediately saves rules and groups, cancelling any pending debounced save.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if the adapter's `save` call fails.
    pub async fn persist(&self) -> Result<(), EngineError> {
        self.require_running()?;
        self.inner.rule_index.persist().await?;
        Ok(())
    }

    // ========================================================================
    // SECTION: Rules & Groups
    // ========================================================================

    /// Registers a rule (spec §6 `registerRule`).
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if the rule's group does not exist.
    pub fn register_rule(&self, rule: Rule) -> Result<Rule, EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.register_rule(rule)?)
    }

    /// Unregisters a rule by id.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if no such rule exists.
    pub fn unregister_rule(&self, id: &RuleId) -> Result<Rule, EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.unregister_rule(id)?)
    }

    /// Enables a previously disabled rule.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if no such rule exists.
    pub fn enable_rule(&self, id: &RuleId) -> Result<(), EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.enable_rule(id)?)
    }

    /// Disables a rule without removing it.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if no such rule exists.
    pub fn disable_rule(&self, id: &RuleId) -> Result<(), EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.disable_rule(id)?)
    }

    /// Returns a rule by id, if registered.
    #[must_use]
    pub fn get_rule(&self, id: &RuleId) -> Option<Rule> {
        self.inner.rule_index.get_rule(id)
    }

    /// Returns every registered rule.
    #[must_use]
    pub fn get_rules(&self) -> Vec<Rule> {
        self.inner.rule_index.get_rules()
    }

    /// Creates a group.
    pub fn create_group(&self, group: Group) -> Result<Group, EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.create_group(group))
    }

    /// Deletes a group, clearing the `group` field on every rule that referenced it.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if no such group exists.
    pub fn delete_group(&self, id: &GroupId) -> Result<Group, EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.delete_group(id)?)
    }

    /// Enables a group.
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if no such group exists.
    pub fn enable_group(&self, id: &GroupId) -> Result<(), EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.enable_group(id)?)
    }

    /// Disables a group. Contained rules become inactive without being
    /// individually disabled (spec §8 "group gating").
    ///
    /// # Errors
    /// Returns [`EngineError::RuleIndex`] if no such group exists.
    pub fn disable_group(&self, id: &GroupId) -> Result<(), EngineError> {
        self.require_running()?;
        Ok(self.inner.rule_index.disable_group(id)?)
    }

    /// Returns a group by id, if one exists.
    #[must_use]
    pub fn get_group(&self, id: &GroupId) -> Option<Group> {
        self.inner.rule_index.get_group(id)
    }

    /// Returns every group.
    #[must_use]
    pub fn get_groups(&self) -> Vec<Group> {
        self.inner.rule_index.get_groups()
    }

    /// Returns every rule belonging to a group.
    #[must_use]
    pub fn get_group_rules(&self, group_id: &GroupId) -> Vec<Rule> {
        self.inner.rule_index.get_group_rules(group_id)
    }

    /// Returns every rule whose reverse action index names `key` as a
    /// `set_fact` target (spec §4.2).
    #[must_use]
    pub fn get_by_fact_action(&self, key: &str) -> Vec<Rule> {
        self.inner.rule_index.get_by_fact_action(key)
    }

    /// Returns every rule whose reverse action index names `topic` as an
    /// `emit_event` target (spec §4.2).
    #[must_use]
    pub fn get_by_event_action(&self, topic: &str) -> Vec<Rule> {
        self.inner.rule_index.get_by_event_action(topic)
    }

    // ========================================================================
    // SECTION: Temporal patterns
    // ========================================================================

    /// Registers a sequence pattern that `Trigger::Temporal { pattern: id }`
    /// rules can bind to.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidTemporalPattern`] if the pattern is
    /// empty or has a zero window.
    pub fn register_sequence_pattern(&self, id: PatternId, pattern: SequencePattern) -> Result<(), EngineError> {
        self.require_running()?;
        self.temporal_lock().sequence.add_pattern(id, pattern)?;
        Ok(())
    }

    /// Registers an absence pattern.
    pub fn register_absence_pattern(&self, id: PatternId, pattern: AbsencePattern) -> Result<(), EngineError> {
        self.require_running()?;
        self.temporal_lock().absence.add_pattern(id, pattern);
        Ok(())
    }

    /// Registers a count pattern.
    pub fn register_count_pattern(&self, id: PatternId, pattern: CountPattern) -> Result<(), EngineError> {
        self.require_running()?;
        self.temporal_lock().count.add_pattern(id, pattern);
        Ok(())
    }

    /// Registers an aggregate pattern.
    pub fn register_aggregate_pattern(&self, id: PatternId, pattern: AggregatePattern) -> Result<(), EngineError> {
        self.require_running()?;
        self.temporal_lock().aggregate.add_pattern(id, pattern);
        Ok(())
    }

    fn temporal_lock(&self) -> std::sync::MutexGuard<'_, TemporalMatchers> {
        self.inner.temporal.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ========================================================================
    // SECTION: Facts
    // ========================================================================

    /// Writes a fact and runs every rule the key now triggers (spec §6 `setFact`).
    ///
    /// # Errors
    /// Returns [`EngineError::NotRunning`] if the engine is stopped.
    pub async fn set_fact(&self, key: impl Into<String>, value: Value, source: Option<&str>) -> Result<Fact, EngineError> {
        self.require_running()?;
        let fact = self.inner.fact_store.set(key, value, source.unwrap_or("system"));
        self.drain().await;
        Ok(fact)
    }

    /// Reads a fact.
    #[must_use]
    pub fn get_fact(&self, key: &str) -> Option<Fact> {
        self.inner.fact_store.get(key)
    }

    /// Deletes a fact, running every rule the key now triggers if it existed.
    ///
    /// # Errors
    /// Returns [`EngineError::NotRunning`] if the engine is stopped.
    pub async fn delete_fact(&self, key: &str) -> Result<bool, EngineError> {
        self.require_running()?;
        let removed = self.inner.fact_store.delete(key);
        self.drain().await;
        Ok(removed)
    }

    /// Queries facts matching a colon-segmented glob pattern.
    #[must_use]
    pub fn query_facts(&self, pattern: &str) -> Vec<Fact> {
        self.inner.fact_store.query(pattern)
    }

    // ========================================================================
    // SECTION: Events
    // ========================================================================

    /// Emits an event, feeding temporal matchers and running every rule it
    /// triggers (spec §6 `emit`).
    ///
    /// # Errors
    /// Returns [`EngineError::NotRunning`] if the engine is stopped.
    pub async fn emit(
        &self,
        topic: impl Into<String>,
        data: Value,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), EngineError> {
        self.require_running()?;
        let event = Event::new(
            EventId::new(format!("evt-{}", self.inner.clock.now_ms())),
            topic,
            data,
            self.inner.clock.now_ms(),
            "system",
            correlation_id,
        );
        self.inner.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push_back(PendingStimulus::Event(event));
        self.drain().await;
        Ok(())
    }

    // ========================================================================
    // SECTION: Timers
    // ========================================================================

    /// Arms a timer directly through the embedding contract (as opposed to a
    /// `set_timer` rule action) — spec §6 `setTimer(spec)`.
    ///
    /// # Errors
    /// Returns [`EngineError::NotRunning`] if the engine is stopped.
    pub async fn set_timer(&self, spec: ActionTimerSpec) -> Result<(), EngineError> {
        self.require_running()?;
        let delay_ms = rules_logic::parse_duration_ms(&spec.delay)
            .map_err(|error| EngineError::Validation(ValidationError::single("delay", error.to_string())))?;
        EngineTimerManager { engine: Arc::downgrade(&self.inner) }
            .set_timer(TimerRequest { name: spec.name, delay_ms, data: spec.data, correlation_id: None })
            .await;
        Ok(())
    }

    /// Cancels a pending timer by name. Does not purge an already-fired timer.
    ///
    /// # Errors
    /// Returns [`EngineError::NotRunning`] if the engine is stopped.
    pub async fn cancel_timer(&self, name: impl Into<String>) -> Result<(), EngineError> {
        self.require_running()?;
        EngineTimerManager { engine: Arc::downgrade(&self.inner) }.cancel_timer(name.into()).await;
        Ok(())
    }

    // ========================================================================
    // SECTION: Services
    // ========================================================================

    /// Registers a service the Action Executor and Data Resolver may call by name.
    pub fn register_service(&self, name: impl Into<String>, service: Arc<dyn Service>) {
        self.inner.services.write().unwrap_or_else(std::sync::PoisonError::into_inner).insert(name.into(), service);
    }

    // ========================================================================
    // SECTION: Trace & Debug
    // ========================================================================

    /// Subscribes to every recorded trace entry, returning a handle for `unsubscribe_trace`.
    pub fn subscribe_trace(&self, subscriber: TraceSubscriber) -> u64 {
        self.inner.trace.subscribe(subscriber)
    }

    /// Removes a trace subscriber.
    pub fn unsubscribe_trace(&self, handle: u64) {
        self.inner.trace.unsubscribe(handle);
    }

    /// Returns the most recently recorded trace entries, oldest first.
    #[must_use]
    pub fn recent_trace(&self, count: usize) -> Vec<DebugTraceEntry> {
        self.inner.trace.recent(count)
    }

    /// Creates a debug session.
    #[must_use]
    pub fn create_debug_session(&self, development_mode: bool) -> String {
        self.inner.debug.create_session(development_mode)
    }

    /// Ends a debug session.
    ///
    /// # Errors
    /// Returns [`EngineError::Debug`] if no such session exists.
    pub fn end_debug_session(&self, session_id: &str) -> Result<(), EngineError> {
        if self.inner.debug.end_session(session_id) {
            Ok(())
        } else {
            Err(EngineError::Debug(DebugError::SessionNotFound(
                session_id.to_string(),
            )))
        }
    }

    /// Adds a breakpoint to a debug session.
    ///
    /// Returns the id assigned to the new breakpoint.
    ///
    /// # Errors
    /// Returns [`EngineError::Debug`] if the session does not exist, or if a
    /// `Pause` breakpoint is requested outside development mode.
    pub fn add_breakpoint(&self, session_id: &str, spec: BreakpointSpec) -> Result<String, EngineError> {
        Ok(self.inner.debug.add_breakpoint(session_id, spec)?)
    }

    /// Removes a breakpoint from a debug session.
    ///
    /// # Errors
    /// Returns [`EngineError::Debug`] if the session or breakpoint does not exist.
    pub fn remove_breakpoint(&self, session_id: &str, breakpoint_id: &str) -> Result<(), EngineError> {
        Ok(self.inner.debug.remove_breakpoint(session_id, breakpoint_id)?)
    }

    /// Takes a snapshot of the current fact set and recent trace for a session.
    ///
    /// # Errors
    /// Returns [`EngineError::Debug`] if the session does not exist.
    pub fn take_snapshot(&self, session_id: &str) -> Result<Snapshot, EngineError> {
        Ok(self.inner.debug.take_snapshot(session_id, &self.inner.fact_store, &self.inner.trace)?)
    }

    /// Clears a session's pause flag and resumes draining the pending-stimulus
    /// queue, picking up wherever a `Pause` breakpoint had stopped it.
    ///
    /// # Errors
    /// Returns [`EngineError::Debug`] if the session does not exist.
    pub async fn resume_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.inner.debug.resume_session(session_id)?;
        self.drain().await;
        Ok(())
    }

    // ========================================================================
    // SECTION: Pipeline
    // ========================================================================

    /// Drains the pending-stimulus queue to exhaustion, processing one entry
    /// fully (including any further work it enqueues) before moving to the
    /// next (spec §5: per-stimulus processing is ordered).
    ///
    /// Re-entrant calls (e.g. a timer callback racing a `set_fact` caller)
    /// are safe: only one drain loop runs at a time, the rest leave their
    /// work on the queue for the active loop to pick up.
    async fn drain(&self) {
        if self.inner.draining.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        loop {
            if self.inner.debug.any_paused() {
                break;
            }
            let next = self.inner.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front();
            let Some(stimulus) = next else { break };
            self.process_stimulus(stimulus).await;
        }
        self.inner.draining.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    async fn process_stimulus(&self, stimulus: PendingStimulus) {
        let audit_record = match &stimulus {
            PendingStimulus::Fact(key) => serde_json::json!({"kind": "fact", "key": key}),
            PendingStimulus::Event(event) => serde_json::json!({"kind": "event", "topic": event.topic}),
            PendingStimulus::Timer { name, .. } => serde_json::json!({"kind": "timer", "name": name}),
            PendingStimulus::Temporal { pattern_id, .. } => {
                serde_json::json!({"kind": "temporal", "patternId": pattern_id.as_str()})
            }
        };
        match stimulus {
            PendingStimulus::Fact(key) => {
                let candidates = self.inner.rule_index.lookup_by_fact(&key);
                let data = self.inner.fact_store.get(&key).map_or(Value::Null, |fact| {
                    serde_json::to_value(&fact).unwrap_or(Value::Null)
                });
                self.run_candidates(candidates, Stimulus::new(data, None)).await;
            }
            PendingStimulus::Event(event) => {
                let outcome = self.temporal_lock().process_event(&event);
                let correlation_id = event.correlation_id.clone();
                let candidates = self.inner.rule_index.lookup_by_event(&event.topic);
                let data = serde_json::to_value(&event).unwrap_or(Value::Null);
                self.run_candidates(candidates, Stimulus::new(data, correlation_id)).await;
                self.handle_temporal_outcome(outcome).await;
            }
            PendingStimulus::Timer { name, data, correlation_id } => {
                let candidates = self.inner.rule_index.lookup_by_timer(&name);
                let payload = serde_json::json!({"name": name, "data": data});
                self.run_candidates(candidates, Stimulus::new(payload, correlation_id)).await;
            }
            PendingStimulus::Temporal { pattern_id, data, correlation_id } => {
                let candidates = self.inner.rule_index.lookup_by_temporal(&pattern_id);
                self.run_candidates(candidates, Stimulus::new(data, correlation_id)).await;
            }
        }
        if let Err(err) = self.inner.audit.record(audit_record).await {
            self.inner.diagnostics.record(DiagnosticLevel::Warn, "audit", &err.to_string());
        }
    }

    async fn handle_temporal_outcome(&self, outcome: TemporalEventOutcome) {
        for expired in &outcome.sequence.expired {
            self.trace_temporal("sequence", &expired.pattern_id, &expired.group_key, false, Value::Null);
        }
        for matched in outcome.sequence.matches {
            let data = serde_json::json!({"events": matched.events, "groupKey": matched.group_key});
            self.trace_temporal("sequence", &matched.pattern_id, &matched.group_key, true, data.clone());
            self.enqueue_temporal(matched.pattern_id, data, last_correlation(&matched.events));
        }
        for matched in outcome.absence.matches {
            let data = serde_json::json!({"triggerEvent": matched.trigger_event, "groupKey": matched.group_key});
            let correlation_id = matched.trigger_event.correlation_id.clone();
            self.trace_temporal("absence", &matched.pattern_id, &matched.group_key, true, data.clone());
            self.enqueue_temporal(matched.pattern_id, data, correlation_id);
        }
        for pending in outcome.absence.new_waits {
            self.schedule_absence_timeout(pending.instance_id, pending.delay_ms);
        }
        for matched in outcome.count.matches {
            let data = serde_json::json!({"count": matched.count, "groupKey": matched.group_key});
            self.trace_temporal("count", &matched.pattern_id, &matched.group_key, true, data.clone());
            self.enqueue_temporal(matched.pattern_id, data, None);
        }
        for pending in outcome.count.new_windows {
            self.schedule_count_window(pending.instance_id, pending.delay_ms);
        }
        for matched in outcome.aggregate.matches {
            let data = serde_json::json!({"value": matched.value, "groupKey": matched.group_key});
            self.trace_temporal("aggregate", &matched.pattern_id, &matched.group_key, true, data.clone());
            self.enqueue_temporal(matched.pattern_id, data, None);
        }
        for pending in outcome.aggregate.new_windows {
            self.schedule_aggregate_window(pending.instance_id, pending.delay_ms);
        }
    }

    fn trace_temporal(&self, kind: &str, pattern_id: &PatternId, group_key: &str, matched: bool, details: Value) {
        let entry = NewTraceEntry::new(TraceEntryType::TemporalMatch).with_details(serde_json::json!({
            "kind": kind,
            "patternId": pattern_id.as_str(),
            "groupKey": group_key,
            "matched": matched,
            "details": details,
        }));
        let recorded = self.inner.trace.record(entry);
        let hits = self.inner.debug.dispatch(&recorded);
        apply_breakpoint_hits(hits, &self.inner.debug, &self.inner.fact_store, &self.inner.trace, &self.inner.diagnostics);
    }

    fn enqueue_temporal(&self, pattern_id: PatternId, data: Value, correlation_id: Option<CorrelationId>) {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(PendingStimulus::Temporal { pattern_id, data, correlation_id });
    }

    fn schedule_absence_timeout(&self, instance_id: rules_core::TemporalInstanceId, delay_ms: u64) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let Some(inner) = weak.upgrade() else { return };
            let matched = inner
                .temporal
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .absence
                .handle_timeout(&instance_id);
            if let Some(matched) = matched {
                let engine = RuleEngine { inner };
                let data = serde_json::json!({"triggerEvent": matched.trigger_event, "groupKey": matched.group_key});
                let correlation_id = matched.trigger_event.correlation_id.clone();
                engine.trace_temporal("absence", &matched.pattern_id, &matched.group_key, true, data.clone());
                engine.enqueue_temporal(matched.pattern_id, data, correlation_id);
                engine.drain().await;
            }
        });
    }

    fn schedule_count_window(&self, instance_id: rules_core::TemporalInstanceId, delay_ms: u64) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let Some(inner) = weak.upgrade() else { return };
            let outcome = inner
                .temporal
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .count
                .handle_window_end(&instance_id);
            if let Some(Ok(matched)) = outcome {
                let engine = RuleEngine { inner };
                let data = serde_json::json!({"count": matched.count, "groupKey": matched.group_key});
                engine.trace_temporal("count", &matched.pattern_id, &matched.group_key, true, data.clone());
                engine.enqueue_temporal(matched.pattern_id, data, None);
                engine.drain().await;
            } else if let Some(Err(expired)) = outcome {
                let engine = RuleEngine { inner };
                engine.trace_temporal("count", &expired.pattern_id, &expired.group_key, false, Value::Null);
            }
        });
    }

    fn schedule_aggregate_window(&self, instance_id: rules_core::TemporalInstanceId, delay_ms: u64) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let Some(inner) = weak.upgrade() else { return };
            let outcome = inner
                .temporal
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .aggregate
                .handle_window_end(&instance_id);
            if let Some(Ok(matched)) = outcome {
                let engine = RuleEngine { inner };
                let data = serde_json::json!({"value": matched.value, "groupKey": matched.group_key});
                engine.trace_temporal("aggregate", &matched.pattern_id, &matched.group_key, true, data.clone());
                engine.enqueue_temporal(matched.pattern_id, data, None);
                engine.drain().await;
            } else if let Some(Err(expired)) = outcome {
                let engine = RuleEngine { inner };
                engine.trace_temporal("aggregate", &expired.pattern_id, &expired.group_key, false, Value::Null);
            }
        });
    }

    /// Runs every candidate rule against one stimulus, in descending
    /// priority order (spec §5 ordering guarantee 3).
    async fn run_candidates(&self, candidates: Vec<Rule>, stimulus: Stimulus) {
        for rule in candidates {
            self.run_rule(&rule, &stimulus).await;
        }
    }

    async fn run_rule(&self, rule: &Rule, stimulus: &Stimulus) {
        let empty_vars = HashMap::new();
        let empty_baselines = HashMap::new();
        let services = self.inner.services.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone();

        let resolve_ctx = EngineContext::new(stimulus, &self.inner.fact_store, &empty_vars, &HashMap::new(), &empty_baselines);
        let resolved: ResolveOutcome = match self.inner.resolver.resolve_all(&rule.requirements, &services, &resolve_ctx).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.trace_rule(rule, stimulus, TraceEntryType::ActionFailed, serde_json::json!({"error": error.to_string()}));
                return;
            }
        };
        if resolved.skipped {
            self.trace_rule(
                rule,
                stimulus,
                TraceEntryType::RuleSkipped,
                serde_json::json!({"errors": resolved.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>()}),
            );
            return;
        }

        let condition_ctx =
            EngineContext::new(stimulus, &self.inner.fact_store, &empty_vars, &resolved.lookups, &empty_baselines);
        let conditions_met = rule.conditions.eval_tristate(&condition_ctx, &KleeneLogic).is_true();
        self.trace_rule(
            rule,
            stimulus,
            TraceEntryType::ConditionsEvaluated,
            serde_json::json!({"met": conditions_met}),
        );
        if !conditions_met {
            self.trace_rule(rule, stimulus, TraceEntryType::RuleSkipped, Value::Null);
            return;
        }

        self.trace_rule(rule, stimulus, TraceEntryType::RuleMatched, Value::Null);
        let mut state = ExecutionState::new(stimulus, &self.inner.fact_store, &resolved.lookups, &empty_baselines);
        let tracer = RuleTracer {
            trace: &self.inner.trace,
            debug: &self.inner.debug,
            fact_store: &self.inner.fact_store,
            diagnostics: &self.inner.diagnostics,
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            correlation_id: stimulus.correlation_id.clone(),
        };
        let _results: Vec<ActionResult> = self.inner.executor.execute(&rule.actions, &mut state, &tracer).await;
    }

    fn trace_rule(&self, rule: &Rule, stimulus: &Stimulus, entry_type: TraceEntryType, details: Value) {
        let entry = NewTraceEntry::new(entry_type)
            .with_correlation(stimulus.correlation_id.clone())
            .with_rule(rule.id.clone(), rule.name.clone())
            .with_details(details);
        let recorded = self.inner.trace.record(entry);
        let hits = self.inner.debug.dispatch(&recorded);
        apply_breakpoint_hits(hits, &self.inner.debug, &self.inner.fact_store, &self.inner.trace, &self.inner.diagnostics);
    }
}

fn last_correlation(events: &[Event]) -> Option<CorrelationId> {
    events.last().and_then(|event| event.correlation_id.clone())
}

/// Runs the non-pause side effects of a breakpoint match (spec §4.6: "the
/// configured action runs"). `Pause` itself is handled inside
/// [`DebugController::dispatch`]; the drain loop checks
/// [`DebugController::any_paused`] between stimuli.
fn apply_breakpoint_hits(
    hits: Vec<BreakpointHit>,
    debug: &DebugController,
    fact_store: &FactStore,
    trace: &TraceCollector,
    diagnostics: &Arc<dyn DiagnosticSink>,
) {
    for hit in hits {
        match hit.action {
            BreakpointAction::Pause => {}
            BreakpointAction::Log => {
                diagnostics.record(
                    DiagnosticLevel::Info,
                    "debug",
                    &format!("breakpoint {} hit in session {}", hit.breakpoint_id, hit.session_id),
                );
            }
            BreakpointAction::Snapshot => {
                if let Err(err) = debug.take_snapshot(&hit.session_id, fact_store, trace) {
                    diagnostics.record(DiagnosticLevel::Warn, "debug", &err.to_string());
                }
            }
        }
    }
}
