// rules-engine/src/temporal/absence.rs
// ============================================================================
// Module: Absence Matcher
// Description: "Did the expected event fail to arrive in time" temporal pattern.
// Purpose: Implement spec §4.3.2 exactly: pending -> waiting -> completed |
//          cancelled, with scheduler-driven timeout and a defensive sweep.
// Dependencies: crate::{clock::SharedClock, temporal::matcher::EventMatcher},
//               rules_core::{Event, PatternId, TemporalInstanceId}
// ============================================================================

//! ## Overview
//! An absence pattern watches for an `after` event, then waits `within` for
//! an `expected` event that would cancel it. If the window elapses without
//! the `expected` event, the absence has "succeeded": the orchestrator is
//! responsible for scheduling [`AbsenceMatcher::handle_timeout`] after
//! `within` elapses (spec §4.3.2's "on `handleTimeout(id)` called by the
//! scheduler"); [`AbsenceMatcher::process_event`] also opportunistically
//! completes any instance whose window has already passed, as a defensive
//! fallback if the scheduler lagged.

use std::collections::HashMap;
use std::collections::HashSet;

use rules_core::Event;
use rules_core::PatternId;
use rules_core::TemporalInstanceId;

use crate::clock::SharedClock;
use crate::temporal::matcher::EventMatcher;
use crate::temporal::matcher::group_key;

/// A registered absence pattern.
#[derive(Debug, Clone)]
pub struct AbsencePattern {
    /// The event that starts the watch.
    pub after: EventMatcher,
    /// The event that, if it arrives in time, cancels the watch.
    pub expected: EventMatcher,
    /// Window, in milliseconds, the `expected` event has to arrive.
    pub within_ms: u64,
    /// Dotted path used to compute a per-event grouping key.
    pub group_by: Option<String>,
}

/// Lifecycle state of one absence instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceState {
    /// Watching for the `expected` event or the window to elapse.
    Waiting,
    /// The window elapsed with no `expected` event: the absence succeeded.
    Completed,
    /// The `expected` event arrived in time: the absence did not occur.
    Cancelled,
}

/// One in-flight absence watch.
#[derive(Debug, Clone)]
pub struct AbsenceInstance {
    /// Instance identifier.
    pub id: TemporalInstanceId,
    /// The pattern this instance belongs to.
    pub pattern_id: PatternId,
    /// The grouping key this instance is scoped to.
    pub group_key: String,
    /// Current lifecycle state.
    pub state: AbsenceState,
    /// The `after` event that started the watch.
    pub trigger_event: Event,
    /// Monotonic milliseconds timestamp the window elapses.
    pub expires_at: u64,
}

/// A succeeded absence: the window elapsed with no `expected` event.
#[derive(Debug, Clone)]
pub struct AbsenceMatch {
    /// The pattern that succeeded.
    pub pattern_id: PatternId,
    /// The grouping key the success occurred under.
    pub group_key: String,
    /// The original `after` event.
    pub trigger_event: Event,
}

/// A newly created instance along with the delay the orchestrator must wait
/// before calling [`AbsenceMatcher::handle_timeout`].
#[derive(Debug, Clone)]
pub struct PendingTimeout {
    /// The instance to time out.
    pub instance_id: TemporalInstanceId,
    /// Milliseconds to wait before calling `handle_timeout`.
    pub delay_ms: u64,
}

/// The result of feeding one event through every registered absence pattern.
#[derive(Debug, Clone, Default)]
pub struct AbsenceOutcome {
    /// Absences completed opportunistically while handling this event.
    pub matches: Vec<AbsenceMatch>,
    /// Newly created instances the orchestrator must schedule a timeout for.
    pub new_waits: Vec<PendingTimeout>,
}

/// Absence ("expected event never arrived") temporal matcher.
pub struct AbsenceMatcher {
    clock: SharedClock,
    patterns: HashMap<PatternId, AbsencePattern>,
    instances: HashMap<TemporalInstanceId, AbsenceInstance>,
    by_pattern: HashMap<PatternId, HashSet<TemporalInstanceId>>,
    by_pattern_group: HashMap<(PatternId, String), TemporalInstanceId>,
    next_seq: u64,
}

impl AbsenceMatcher {
    /// Builds an empty matcher.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            patterns: HashMap::new(),
            instances: HashMap::new(),
            by_pattern: HashMap::new(),
            by_pattern_group: HashMap::new(),
            next_seq: 0,
        }
    }

    fn fresh_instance_id(&mut self) -> TemporalInstanceId {
        self.next_seq += 1;
        TemporalInstanceId::new(format!("abs-{}", self.next_seq))
    }

    /// Registers (or replaces) an absence pattern.
    pub fn add_pattern(&mut self, id: PatternId, pattern: AbsencePattern) {
        self.remove_pattern(&id);
        self.patterns.insert(id, pattern);
    }

    /// Removes a pattern and every instance of it.
    pub fn remove_pattern(&mut self, id: &PatternId) {
        self.patterns.remove(id);
        if let Some(instance_ids) = self.by_pattern.remove(id) {
            for instance_id in instance_ids {
                if let Some(instance) = self.instances.remove(&instance_id) {
                    self.by_pattern_group.remove(&(id.clone(), instance.group_key));
                }
            }
        }
    }

    /// Discards every pattern and instance.
    pub fn reset(&mut self) {
        self.patterns.clear();
        self.instances.clear();
        self.by_pattern.clear();
        self.by_pattern_group.clear();
    }

    /// Discards every instance, keeping registered patterns.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.by_pattern.clear();
        self.by_pattern_group.clear();
    }

    /// Returns the number of instances still `Waiting`.
    #[must_use]
    pub fn waiting_instance_count(&self) -> usize {
        self.instances.values().filter(|i| i.state == AbsenceState::Waiting).count()
    }

    fn remove_instance(&mut self, instance_id: &TemporalInstanceId) -> Option<AbsenceInstance> {
        let instance = self.instances.remove(instance_id)?;
        if let Some(bucket) = self.by_pattern.get_mut(&instance.pattern_id) {
            bucket.remove(instance_id);
        }
        self.by_pattern_group.remove(&(instance.pattern_id.clone(), instance.group_key.clone()));
        Some(instance)
    }

    /// Feeds one event through every registered pattern.
    pub fn process_event(&mut self, event: &Event) -> AbsenceOutcome {
        let now = self.clock.now_ms();
        let mut outcome = AbsenceOutcome::default();

        self.sweep_expired(now, &mut outcome);

        let pattern_ids: Vec<PatternId> = self.patterns.keys().cloned().collect();
        for pattern_id in pattern_ids {
            self.process_pattern(&pattern_id, event, now, &mut outcome);
        }
        outcome
    }

    /// Defensive sweep (spec §4.3.2): complete any waiting instance whose
    /// window has already passed, independent of the scheduler.
    fn sweep_expired(&mut self, now: u64, outcome: &mut AbsenceOutcome) {
        let expired: Vec<TemporalInstanceId> = self
            .instances
            .values()
            .filter(|i| i.state == AbsenceState::Waiting && now >= i.expires_at)
            .map(|i| i.id.clone())
            .collect();
        for instance_id in expired {
            if let Some(instance_match) = self.complete(&instance_id) {
                outcome.matches.push(instance_match);
            }
        }
    }

    fn process_pattern(&mut self, pattern_id: &PatternId, event: &Event, now: u64, outcome: &mut AbsenceOutcome) {
        let Some(pattern) = self.patterns.get(pattern_id).cloned() else { return };
        let key = group_key(event, pattern.group_by.as_deref());
        let slot = (pattern_id.clone(), key.clone());

        if pattern.expected.matches(event) {
            if let Some(instance_id) = self.by_pattern_group.get(&slot).cloned() {
                self.remove_instance(&instance_id);
            }
            return;
        }

        if pattern.after.matches(event) && !self.by_pattern_group.contains_key(&slot) {
            let instance_id = self.fresh_instance_id();
            let expires_at = now + pattern.within_ms;
            let instance = AbsenceInstance {
                id: instance_id.clone(),
                pattern_id: pattern_id.clone(),
                group_key: key.clone(),
                state: AbsenceState::Waiting,
                trigger_event: event.clone(),
                expires_at,
            };
            self.by_pattern.entry(pattern_id.clone()).or_default().insert(instance_id.clone());
            self.by_pattern_group.insert(slot, instance_id.clone());
            self.instances.insert(instance_id.clone(), instance);
            outcome.new_waits.push(PendingTimeout { instance_id, delay_ms: pattern.within_ms });
        }
    }

    fn complete(&mut self, instance_id: &TemporalInstanceId) -> Option<AbsenceMatch> {
        let instance = self.remove_instance(instance_id)?;
        Some(AbsenceMatch {
            pattern_id: instance.pattern_id,
            group_key: instance.group_key,
            trigger_event: instance.trigger_event,
        })
    }

    /// Called by the scheduler after `within` has elapsed for `instance_id`.
    ///
    /// Returns `Some` (the absence succeeded) only if the instance is still
    /// `Waiting` — if the `expected` event already cancelled it, this is a no-op.
    pub fn handle_timeout(&mut self, instance_id: &TemporalInstanceId) -> Option<AbsenceMatch> {
        if !self.instances.contains_key(instance_id) {
            return None;
        }
        self.complete(instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rules_core::EventId;
    use serde_json::json;
    use std::sync::Arc;

    fn event(topic: &str, order_id: &str, at: u64) -> Event {
        Event::new(EventId::new(format!("{topic}-{order_id}")), topic, json!({"orderId": order_id}), at, "system", None)
    }

    fn matcher(clock: Arc<ManualClock>) -> AbsenceMatcher {
        let mut m = AbsenceMatcher::new(clock);
        m.add_pattern(
            PatternId::new("p1"),
            AbsencePattern {
                after: EventMatcher::topic("order.created"),
                expected: EventMatcher::topic("payment.received"),
                within_ms: 900_000,
                group_by: Some("orderId".to_string()),
            },
        );
        m
    }

    #[test]
    fn timeout_after_no_expected_event_completes() {
        let clock = Arc::new(ManualClock::new(0));
        let mut m = matcher(Arc::clone(&clock));
        let outcome = m.process_event(&event("order.created", "o1", 0));
        assert_eq!(outcome.new_waits.len(), 1);
        let instance_id = outcome.new_waits[0].instance_id.clone();

        clock.set(900_001);
        let result = m.handle_timeout(&instance_id);
        assert!(result.is_some());
        assert_eq!(m.waiting_instance_count(), 0);
    }

    #[test]
    fn expected_event_cancels_before_timeout() {
        let clock = Arc::new(ManualClock::new(0));
        let mut m = matcher(Arc::clone(&clock));
        let outcome = m.process_event(&event("order.created", "o1", 0));
        let instance_id = outcome.new_waits[0].instance_id.clone();

        clock.set(1000);
        m.process_event(&event("payment.received", "o1", 1000));
        assert_eq!(m.waiting_instance_count(), 0);

        clock.set(900_001);
        assert!(m.handle_timeout(&instance_id).is_none());
    }

    #[test]
    fn defensive_sweep_completes_lagged_scheduler() {
        let clock = Arc::new(ManualClock::new(0));
        let mut m = matcher(Arc::clone(&clock));
        m.process_event(&event("order.created", "o1", 0));

        clock.set(1_000_000);
        let outcome = m.process_event(&event("order.created", "o2", 1_000_000));
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].group_key, "o1");
    }
}
