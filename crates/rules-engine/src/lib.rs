// rules-engine/src/lib.rs
// ============================================================================
// Module: Rules Engine Library
// Description: Public API surface for the embeddable forward-chaining rules
//              engine: Fact Store, Rule Index, Temporal Matchers, Data
//              Resolver, Action Executor, Trace Collector, Debug Controller,
//              and the `RuleEngine` orchestrator tying them together.
// Purpose: Expose one crate an embedder links against for the whole engine;
//          every submodule below is independently testable, but `engine`
//          is the only type most callers ever construct directly.
// Dependencies: rules_core, rules_logic, tokio, async_trait, futures, thiserror
// ============================================================================

//! ## Overview
//! `rules-engine` implements the dispatch pipeline: a stimulus (fact change,
//! event, timer expiry, or temporal match) looks up candidate rules in the
//! [`rule_index`], resolves its data requirements via the [`resolver`],
//! evaluates its conditions, and runs its actions through the [`executor`].
//! [`temporal`] matchers watch every event independently of rule dispatch.
//! [`trace`] and [`debug`] give an embedder visibility and breakpoints over
//! that pipeline. [`engine::RuleEngine`] is the orchestrator that wires all
//! of the above into the single-threaded cooperative processing loop spec'd
//! for one stimulus at a time.

pub mod clock;
pub mod context;
pub mod debug;
pub mod engine;
pub mod executor;
pub mod fact_store;
pub mod interfaces;
pub mod interpolation;
pub mod persistence;
pub mod resolver;
pub mod rule_index;
pub mod temporal;
pub mod trace;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SharedClock;
pub use clock::SystemClock;
pub use debug::BreakpointAction;
pub use debug::BreakpointCondition;
pub use debug::BreakpointSpec;
pub use debug::BreakpointType;
pub use debug::DebugController;
pub use debug::DebugError;
pub use debug::Snapshot;
pub use engine::EngineError;
pub use engine::EngineOptions;
pub use engine::RuleEngine;
pub use executor::ActionExecutor;
pub use executor::ActionResult;
pub use executor::ActionTracer;
pub use executor::EventSink;
pub use executor::TimerManager;
pub use executor::TimerRequest;
pub use fact_store::FactStore;
pub use interfaces::AuditSink;
pub use interfaces::BaselineProvider;
pub use interfaces::DiagnosticSink;
pub use interfaces::NoopAuditSink;
pub use interfaces::NoopBaselineProvider;
pub use interfaces::NullDiagnosticSink;
pub use interfaces::PersistenceError;
pub use interfaces::RulePersistence;
pub use interfaces::Service;
pub use persistence::InMemoryPersistence;
pub use resolver::DataResolver;
pub use rule_index::RuleIndex;
pub use rule_index::RuleIndexError;
pub use trace::DebugTraceEntry;
pub use trace::NewTraceEntry;
pub use trace::TraceCollector;
pub use trace::TraceEntryType;
