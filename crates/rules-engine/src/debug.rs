// rules-engine/src/debug.rs
// ============================================================================
// Module: Debug Controller
// Description: Debug sessions, breakpoints, and point-in-time snapshots over
//              a `TraceCollector`.
// Purpose: Implement spec §4.6's Debug Controller half: a development-only
//          surface for pausing on a condition, logging a breakpoint hit, or
//          capturing a snapshot of current facts plus recent trace history.
// Dependencies: crate::trace::{TraceCollector, DebugTraceEntry}, crate::fact_store::FactStore
// ============================================================================

//! ## Overview
//! A session owns its own breakpoints and snapshots; sessions do not share
//! state. [`DebugController::dispatch`] is the single entry point the
//! orchestrator calls after every [`crate::trace::TraceCollector::record`]:
//! it tests the entry against every enabled breakpoint in every session and
//! returns the set of effects the orchestrator must carry out (logging is
//! the orchestrator's `DiagnosticSink`, pausing sets a per-session flag the
//! orchestrator checks between stimuli, per spec §9's note that the
//! cooperative pause point is development-only).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rules_core::CorrelationId;
use rules_core::Fact;
use rules_core::RuleId;
use thiserror::Error;

use crate::clock::SharedClock;
use crate::fact_store::FactStore;
use crate::trace::DebugTraceEntry;
use crate::trace::TraceCollector;
use crate::trace::TraceEntryType;

/// The coarse category of trace entry a breakpoint applies to (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointType {
    /// Rule match/skip entries.
    Rule,
    /// Event and temporal-match entries.
    Event,
    /// Fact-change entries.
    Fact,
    /// Action lifecycle entries.
    Action,
}

impl BreakpointType {
    fn applies_to(self, entry_type: TraceEntryType) -> bool {
        match self {
            Self::Rule => matches!(entry_type, TraceEntryType::RuleMatched | TraceEntryType::RuleSkipped | TraceEntryType::ConditionsEvaluated),
            Self::Event => matches!(entry_type, TraceEntryType::EventEmitted | TraceEntryType::TemporalMatch),
            Self::Fact => matches!(entry_type, TraceEntryType::FactChanged),
            Self::Action => matches!(entry_type, TraceEntryType::ActionStarted | TraceEntryType::ActionCompleted | TraceEntryType::ActionFailed),
        }
    }
}

/// What a breakpoint does once it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointAction {
    /// Suspend the engine at the next cooperative pause point.
    Pause,
    /// Record a diagnostic log line; does not suspend anything.
    Log,
    /// Capture a snapshot of current facts plus recent trace history.
    Snapshot,
}

/// A finer-grained filter refining a breakpoint's [`BreakpointType`].
///
/// Every set field must match for the breakpoint to fire; `None` fields are
/// wildcards.
#[derive(Debug, Clone, Default)]
pub struct BreakpointCondition {
    /// Matches only entries concerning this rule.
    pub rule_id: Option<RuleId>,
    /// Matches only entries carrying this correlation id.
    pub correlation_id: Option<CorrelationId>,
}

impl BreakpointCondition {
    fn matches(&self, entry: &DebugTraceEntry) -> bool {
        self.rule_id.as_ref().is_none_or(|id| Some(id) == entry.rule_id.as_ref())
            && self.correlation_id.as_ref().is_none_or(|id| Some(id) == entry.correlation_id.as_ref())
    }
}

/// A registered breakpoint (spec §4.6: `{type, condition, action, enabled, hitCount}`).
#[derive(Debug, Clone)]
pub struct Breakpoint {
    /// Breakpoint identifier, unique within its session.
    pub id: String,
    /// The coarse category of entry this breakpoint watches.
    pub breakpoint_type: BreakpointType,
    /// The finer-grained filter within that category.
    pub condition: BreakpointCondition,
    /// What happens when this breakpoint matches.
    pub action: BreakpointAction,
    /// Whether this breakpoint is currently active.
    pub enabled: bool,
    /// How many times this breakpoint has matched.
    pub hit_count: u64,
}

/// Specification for registering a new breakpoint.
#[derive(Debug, Clone)]
pub struct BreakpointSpec {
    /// The coarse category of entry this breakpoint watches.
    pub breakpoint_type: BreakpointType,
    /// The finer-grained filter within that category.
    pub condition: BreakpointCondition,
    /// What happens when this breakpoint matches.
    pub action: BreakpointAction,
}

/// A point-in-time capture of engine state (spec §4.6: "facts + last 50 trace entries").
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: String,
    /// When the snapshot was taken, monotonic milliseconds.
    pub timestamp: u64,
    /// Every fact held by the Fact Store at capture time.
    pub facts: Vec<Fact>,
    /// The most recent trace entries, oldest first, capped at 50.
    pub recent_trace: Vec<DebugTraceEntry>,
}

const SNAPSHOT_TRACE_DEPTH: usize = 50;

/// Errors produced by the Debug Controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DebugError {
    /// No session exists with this id.
    #[error("debug session \"{0}\" does not exist")]
    SessionNotFound(String),
    /// No breakpoint exists with this id in the given session.
    #[error("breakpoint \"{0}\" does not exist")]
    BreakpointNotFound(String),
    /// A `Pause` breakpoint was requested outside a development-mode session.
    #[error("pause breakpoints require a development-mode session")]
    PauseRequiresDevelopmentMode,
}

struct Session {
    development_mode: bool,
    breakpoints: Vec<Breakpoint>,
    snapshots: Vec<Snapshot>,
    total_hits: u64,
    paused: bool,
}

/// One breakpoint match, reported to the caller so it can apply the
/// `Log`/`Pause` side effect through its own diagnostic/control surface.
#[derive(Debug, Clone)]
pub struct BreakpointHit {
    /// The session the breakpoint belongs to.
    pub session_id: String,
    /// The breakpoint that matched.
    pub breakpoint_id: String,
    /// What the breakpoint's action requires the caller to do.
    pub action: BreakpointAction,
}

/// Debug sessions, breakpoints, and snapshots over a shared [`TraceCollector`].
pub struct DebugController {
    clock: SharedClock,
    sessions: Mutex<HashMap<String, Session>>,
    next_session_id: AtomicU64,
    next_breakpoint_id: AtomicU64,
    next_snapshot_id: AtomicU64,
}

impl DebugController {
    /// Builds an empty controller with no sessions.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(0),
            next_breakpoint_id: AtomicU64::new(0),
            next_snapshot_id: AtomicU64::new(0),
        }
    }

    /// Opens a new debug session. Only a development-mode session may hold
    /// `Pause` breakpoints (spec §4.6).
    pub fn create_session(&self, development_mode: bool) -> String {
        let id = format!("session-{}", self.next_session_id.fetch_add(1, Ordering::SeqCst));
        let session = Session { development_mode, breakpoints: Vec::new(), snapshots: Vec::new(), total_hits: 0, paused: false };
        self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(id.clone(), session);
        id
    }

    /// Closes a session, discarding its breakpoints and snapshots.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(session_id).is_some()
    }

    /// Registers a breakpoint in `session_id`.
    ///
    /// # Errors
    /// Returns [`DebugError::SessionNotFound`] if the session does not
    /// exist, or [`DebugError::PauseRequiresDevelopmentMode`] if `spec.action`
    /// is [`BreakpointAction::Pause`] and the session is not in development mode.
    pub fn add_breakpoint(&self, session_id: &str, spec: BreakpointSpec) -> Result<String, DebugError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let session = sessions.get_mut(session_id).ok_or_else(|| DebugError::SessionNotFound(session_id.to_string()))?;
        if spec.action == BreakpointAction::Pause && !session.development_mode {
            return Err(DebugError::PauseRequiresDevelopmentMode);
        }
        let id = format!("bp-{}", self.next_breakpoint_id.fetch_add(1, Ordering::SeqCst));
        session.breakpoints.push(Breakpoint {
            id: id.clone(),
            breakpoint_type: spec.breakpoint_type,
            condition: spec.condition,
            action: spec.action,
            enabled: true,
            hit_count: 0,
        });
        Ok(id)
    }

    /// Removes a breakpoint.
    pub fn remove_breakpoint(&self, session_id: &str, breakpoint_id: &str) -> Result<(), DebugError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let session = sessions.get_mut(session_id).ok_or_else(|| DebugError::SessionNotFound(session_id.to_string()))?;
        let before = session.breakpoints.len();
        session.breakpoints.retain(|bp| bp.id != breakpoint_id);
        if session.breakpoints.len() == before {
            return Err(DebugError::BreakpointNotFound(breakpoint_id.to_string()));
        }
        Ok(())
    }

    /// Enables or disables a breakpoint without removing it.
    pub fn set_breakpoint_enabled(&self, session_id: &str, breakpoint_id: &str, enabled: bool) -> Result<(), DebugError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let session = sessions.get_mut(session_id).ok_or_else(|| DebugError::SessionNotFound(session_id.to_string()))?;
        let breakpoint = session
            .breakpoints
            .iter_mut()
            .find(|bp| bp.id == breakpoint_id)
            .ok_or_else(|| DebugError::BreakpointNotFound(breakpoint_id.to_string()))?;
        breakpoint.enabled = enabled;
        Ok(())
    }

    /// Lists breakpoints registered in a session.
    #[must_use]
    pub fn list_breakpoints(&self, session_id: &str) -> Vec<Breakpoint> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(session_id)
            .map(|session| session.breakpoints.clone())
            .unwrap_or_default()
    }

    /// Tests `entry` against every enabled breakpoint in every session,
    /// incrementing `hitCount`/`totalHits` on match and returning the set of
    /// effects the caller (the orchestrator) must apply.
    pub fn dispatch(&self, entry: &DebugTraceEntry) -> Vec<BreakpointHit> {
        let mut hits = Vec::new();
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (session_id, session) in sessions.iter_mut() {
            let mut session_hit = false;
            for breakpoint in &mut session.breakpoints {
                if !breakpoint.enabled || !breakpoint.breakpoint_type.applies_to(entry.entry_type) || !breakpoint.condition.matches(entry) {
                    continue;
                }
                breakpoint.hit_count += 1;
                session_hit = true;
                if breakpoint.action == BreakpointAction::Pause {
                    session.paused = true;
                }
                hits.push(BreakpointHit { session_id: session_id.clone(), breakpoint_id: breakpoint.id.clone(), action: breakpoint.action });
            }
            if session_hit {
                session.total_hits += 1;
            }
        }
        hits
    }

    /// True if a `Pause` breakpoint has fired in this session and
    /// [`Self::resume_session`] has not yet been called.
    #[must_use]
    pub fn is_paused(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(session_id)
            .is_some_and(|session| session.paused)
    }

    /// True if any session currently has its pause flag set. The
    /// orchestrator's queue-drain loop checks this between stimuli — the
    /// cooperative pause point the open question in spec §9 calls for
    /// (development-only, since `Pause` breakpoints may only be registered
    /// in a development-mode session).
    #[must_use]
    pub fn any_paused(&self) -> bool {
        self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner).values().any(|session| session.paused)
    }

    /// Clears a session's pause flag, letting the orchestrator proceed.
    pub fn resume_session(&self, session_id: &str) -> Result<(), DebugError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let session = sessions.get_mut(session_id).ok_or_else(|| DebugError::SessionNotFound(session_id.to_string()))?;
        session.paused = false;
        Ok(())
    }

    /// Total breakpoint matches recorded across this session's lifetime.
    #[must_use]
    pub fn total_hits(&self, session_id: &str) -> u64 {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(session_id)
            .map_or(0, |session| session.total_hits)
    }

    /// Captures current facts plus the last 50 trace entries into a new
    /// snapshot stored on the session.
    ///
    /// # Errors
    /// Returns [`DebugError::SessionNotFound`] if the session does not exist.
    pub fn take_snapshot(&self, session_id: &str, facts: &FactStore, collector: &TraceCollector) -> Result<Snapshot, DebugError> {
        let snapshot = Snapshot {
            id: format!("snap-{}", self.next_snapshot_id.fetch_add(1, Ordering::SeqCst)),
            timestamp: self.clock.now_ms(),
            facts: facts.get_all(),
            recent_trace: collector.recent(SNAPSHOT_TRACE_DEPTH),
        };
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let session = sessions.get_mut(session_id).ok_or_else(|| DebugError::SessionNotFound(session_id.to_string()))?;
        session.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Lists every snapshot captured in a session.
    #[must_use]
    pub fn list_snapshots(&self, session_id: &str) -> Vec<Snapshot> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(session_id)
            .map(|session| session.snapshots.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::interfaces::NullDiagnosticSink;
    use crate::trace::NewTraceEntry;
    use std::sync::Arc;

    fn controller() -> DebugController {
        DebugController::new(Arc::new(ManualClock::new(0)))
    }

    #[test]
    fn pause_breakpoint_rejected_outside_development_mode() {
        let controller = controller();
        let session = controller.create_session(false);
        let result = controller.add_breakpoint(
            &session,
            BreakpointSpec { breakpoint_type: BreakpointType::Rule, condition: BreakpointCondition::default(), action: BreakpointAction::Pause },
        );
        assert_eq!(result, Err(DebugError::PauseRequiresDevelopmentMode));
    }

    #[test]
    fn pause_breakpoint_allowed_in_development_mode() {
        let controller = controller();
        let session = controller.create_session(true);
        let result = controller.add_breakpoint(
            &session,
            BreakpointSpec { breakpoint_type: BreakpointType::Rule, condition: BreakpointCondition::default(), action: BreakpointAction::Pause },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn matching_breakpoint_increments_hit_count_and_pauses() {
        let controller = controller();
        let session = controller.create_session(true);
        controller
            .add_breakpoint(
                &session,
                BreakpointSpec { breakpoint_type: BreakpointType::Rule, condition: BreakpointCondition::default(), action: BreakpointAction::Pause },
            )
            .unwrap();

        let collector = TraceCollector::new(Arc::new(ManualClock::new(0)), true, 100, Arc::new(NullDiagnosticSink));
        let entry = collector.record(NewTraceEntry::new(TraceEntryType::RuleMatched));
        let hits = controller.dispatch(&entry);

        assert_eq!(hits.len(), 1);
        assert!(controller.is_paused(&session));
        assert_eq!(controller.list_breakpoints(&session)[0].hit_count, 1);
        assert_eq!(controller.total_hits(&session), 1);
    }

    #[test]
    fn non_matching_breakpoint_type_does_not_fire() {
        let controller = controller();
        let session = controller.create_session(true);
        controller
            .add_breakpoint(
                &session,
                BreakpointSpec { breakpoint_type: BreakpointType::Fact, condition: BreakpointCondition::default(), action: BreakpointAction::Log },
            )
            .unwrap();

        let collector = TraceCollector::new(Arc::new(ManualClock::new(0)), true, 100, Arc::new(NullDiagnosticSink));
        let entry = collector.record(NewTraceEntry::new(TraceEntryType::RuleMatched));
        assert!(controller.dispatch(&entry).is_empty());
    }

    #[test]
    fn resume_clears_pause_flag() {
        let controller = controller();
        let session = controller.create_session(true);
        controller
            .add_breakpoint(
                &session,
                BreakpointSpec { breakpoint_type: BreakpointType::Rule, condition: BreakpointCondition::default(), action: BreakpointAction::Pause },
            )
            .unwrap();
        let collector = TraceCollector::new(Arc::new(ManualClock::new(0)), true, 100, Arc::new(NullDiagnosticSink));
        let entry = collector.record(NewTraceEntry::new(TraceEntryType::RuleMatched));
        controller.dispatch(&entry);
        assert!(controller.is_paused(&session));
        controller.resume_session(&session).unwrap();
        assert!(!controller.is_paused(&session));
    }

    #[test]
    fn snapshot_captures_facts_and_recent_trace() {
        let controller = controller();
        let session = controller.create_session(true);
        let clock: SharedClock = Arc::new(ManualClock::new(0));
        let facts = FactStore::new("test".to_string(), Arc::clone(&clock), Arc::new(NullDiagnosticSink));
        facts.set("k1", serde_json::json!(1), "system");
        let collector = TraceCollector::new(Arc::clone(&clock), true, 100, Arc::new(NullDiagnosticSink));
        collector.record(NewTraceEntry::new(TraceEntryType::FactChanged));

        let snapshot = controller.take_snapshot(&session, &facts, &collector).unwrap();
        assert_eq!(snapshot.facts.len(), 1);
        assert_eq!(snapshot.recent_trace.len(), 1);
        assert_eq!(controller.list_snapshots(&session).len(), 1);
    }
}
