// rules-engine/src/interfaces.rs
// ============================================================================
// Module: Engine Interfaces
// Description: Backend-agnostic interfaces for services, persistence, audit,
//              baselines, and diagnostics.
// Purpose: Define the contract surfaces the orchestrator calls into, so the
//          engine core never embeds a concrete service registry, database,
//          or logging framework (spec §1 "out of scope" list).
// Dependencies: async_trait, serde_json::Value, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the engine integrates with everything the spec
//! calls an external collaborator: registered services, persistence
//! adapters, the audit log, baseline statistics, and process-wide logging.
//! Implementations must be deterministic and fail closed on missing data.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use rules_core::Group;
use rules_core::Rule;

// ============================================================================
// SECTION: Service Registry
// ============================================================================

/// Errors surfaced by a `call_service` invocation or the Data Resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No service is registered under this name.
    #[error("Service \"{0}\" is not registered")]
    ServiceNotFound(String),
    /// The service does not expose this method.
    #[error("Method \"{method}\" not found on service \"{service}\"")]
    MethodNotFound {
        /// Service name.
        service: String,
        /// Method name.
        method: String,
    },
    /// The method itself reported a failure.
    #[error("{0}")]
    Invocation(String),
}

/// A callable registered service.
///
/// Mirrors spec §4.4's `call_service`: invocation is asynchronous so the
/// executor may suspend while the service call is in flight (spec §5).
#[async_trait]
pub trait Service: Send + Sync {
    /// Invokes `method` with `args`, returning the method's result value.
    ///
    /// # Errors
    /// Returns [`ServiceError::MethodNotFound`] if `method` is unknown to
    /// this service, or [`ServiceError::Invocation`] if the method itself
    /// fails.
    async fn call(&self, method: &str, args: Value) -> Result<Value, ServiceError>;
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Errors surfaced by a [`RulePersistence`] adapter.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The adapter's storage medium reported an I/O failure.
    #[error("persistence io error: {0}")]
    Io(String),
    /// The persisted payload could not be decoded.
    #[error("persistence decode error: {0}")]
    Decode(String),
}

/// Persistence adapter for rules and groups (spec §6 "Persisted layout").
///
/// Background (debounced) saves swallow errors from this trait; only an
/// explicit `persist` call surfaces them to the caller (spec §7).
#[async_trait]
pub trait RulePersistence: Send + Sync {
    /// Loads the complete rule and group sets.
    ///
    /// # Errors
    /// Returns [`PersistenceError`] when the underlying medium cannot be read.
    async fn load(&self) -> Result<(Vec<Rule>, Vec<Group>), PersistenceError>;

    /// Overwrites the complete rule and group sets.
    ///
    /// # Errors
    /// Returns [`PersistenceError`] when the underlying medium cannot be written.
    async fn save(&self, rules: &[Rule], groups: &[Group]) -> Result<(), PersistenceError>;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Errors surfaced by an [`AuditSink`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit back-end reported a failure.
    #[error("audit sink error: {0}")]
    Sink(String),
}

/// Audit log back-end (spec §1: out of scope, interfaced only).
///
/// The orchestrator calls this once per completed stimulus-processing pass;
/// flush cadence is the adapter's concern (spec §6's `audit.flushIntervalMs`
/// configures how an implementation batches these calls, not this trait).
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one audit record as an opaque JSON value.
    ///
    /// # Errors
    /// Returns [`AuditError`] when the record cannot be accepted.
    async fn record(&self, record: Value) -> Result<(), AuditError>;
}

/// An [`AuditSink`] that discards every record.
///
/// The default when no adapter is configured, matching spec §1's
/// "out of scope, interfaced only" status for the audit log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _record: Value) -> Result<(), AuditError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Baseline Provider
// ============================================================================

/// Errors surfaced by a [`BaselineProvider`].
#[derive(Debug, Error)]
pub enum BaselineError {
    /// The baseline computation back-end reported a failure.
    #[error("baseline provider error: {0}")]
    Provider(String),
}

/// Baseline statistics provider (spec §1: anomaly detection, out of scope).
///
/// The Condition Evaluator resolves `baseline.*` context paths through this
/// trait exactly like any other lookup; a missing baseline resolves to
/// [`rules_logic::TriState::Unknown`] rather than failing the rule.
#[async_trait]
pub trait BaselineProvider: Send + Sync {
    /// Returns the current baseline value for `key`, if one has been computed.
    ///
    /// # Errors
    /// Returns [`BaselineError`] when the computation back-end itself fails
    /// (distinct from "no baseline yet", which returns `Ok(None)`).
    async fn baseline(&self, key: &str) -> Result<Option<Value>, BaselineError>;
}

/// A [`BaselineProvider`] that never has a baseline for any key.
///
/// The default when no adapter is configured, matching spec §1's
/// "anomaly detection, out of scope" status for baselines.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBaselineProvider;

#[async_trait]
impl BaselineProvider for NoopBaselineProvider {
    async fn baseline(&self, _key: &str) -> Result<Option<Value>, BaselineError> {
        Ok(None)
    }
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// A caught exception that did not affect the caller's result.
    Warn,
    /// An unexpected condition worth surfacing even though nothing failed.
    Info,
}

/// Sink for "caught and logged" diagnostics (spec §7: Fact Store listener
/// exceptions, trace-subscriber exceptions, background persistence failures).
///
/// The engine never depends on a process-wide logging framework; callers
/// that want logs wire a [`DiagnosticSink`] that writes wherever they like.
pub trait DiagnosticSink: Send + Sync {
    /// Records a diagnostic message, tagged with the component that caught it.
    fn record(&self, level: DiagnosticLevel, component: &str, message: &str);
}

/// A [`DiagnosticSink`] that discards every record.
///
/// The default when no sink is configured — matches the spec's policy of
/// "caught and logged" being best-effort, never load-bearing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnosticSink;

impl DiagnosticSink for NullDiagnosticSink {
    fn record(&self, _level: DiagnosticLevel, _component: &str, _message: &str) {}
}
