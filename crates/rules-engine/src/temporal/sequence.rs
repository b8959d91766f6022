// rules-engine/src/temporal/sequence.rs
// ============================================================================
// Module: Sequence Matcher
// Description: Ordered-event-sequence temporal pattern state machine.
// Purpose: Implement spec §4.3.1 exactly: pending -> matching -> completed |
//          expired, at most one matching instance per (pattern, group).
// Dependencies: crate::{clock::SharedClock, temporal::matcher::EventMatcher},
//               rules_core::{Event, PatternId, TemporalInstanceId}
// ============================================================================

//! ## Overview
//! A sequence pattern is an ordered list of [`EventMatcher`]s; an instance
//! tracks how many of them have matched in order, and is discarded if its
//! window elapses or (with `strict` set) an out-of-order event arrives.

use std::collections::HashMap;
use std::collections::HashSet;

use rules_core::Event;
use rules_core::PatternId;
use rules_core::TemporalInstanceId;

use crate::clock::SharedClock;
use crate::temporal::matcher::EventMatcher;
use crate::temporal::matcher::group_key;

/// A registered sequence pattern.
#[derive(Debug, Clone)]
pub struct SequencePattern {
    /// Ordered event matchers; an instance completes once all have matched in order.
    pub steps: Vec<EventMatcher>,
    /// Window, in milliseconds, from the first matched event to completion.
    pub within_ms: u64,
    /// Dotted path used to compute a per-event grouping key.
    pub group_by: Option<String>,
    /// If set, an out-of-order event discards the in-flight instance instead
    /// of being ignored.
    pub strict: bool,
}

/// Lifecycle state of one sequence instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Waiting to match its next expected step.
    Matching,
    /// Every step matched in order.
    Completed,
    /// The window elapsed before completion.
    Expired,
}

/// One in-flight occurrence of a sequence pattern.
#[derive(Debug, Clone)]
pub struct SequenceInstance {
    /// Instance identifier.
    pub id: TemporalInstanceId,
    /// The pattern this instance belongs to.
    pub pattern_id: PatternId,
    /// The grouping key this instance is scoped to.
    pub group_key: String,
    /// Current lifecycle state.
    pub state: SequenceState,
    /// Events matched so far, in order.
    pub matched: Vec<Event>,
    /// Monotonic milliseconds timestamp the instance was created.
    pub started_at: u64,
    /// Monotonic milliseconds timestamp after which the instance expires.
    pub expires_at: u64,
}

/// A completed sequence: every step matched within the window.
#[derive(Debug, Clone)]
pub struct SequenceMatch {
    /// The pattern that completed.
    pub pattern_id: PatternId,
    /// The grouping key the completion occurred under.
    pub group_key: String,
    /// The matched events, in order.
    pub events: Vec<Event>,
}

/// A sequence instance that expired before completing.
#[derive(Debug, Clone)]
pub struct SequenceExpired {
    /// The pattern whose instance expired.
    pub pattern_id: PatternId,
    /// The grouping key of the expired instance.
    pub group_key: String,
    /// Events that had matched before expiry.
    pub matched: Vec<Event>,
}

/// The result of feeding one event through every registered sequence pattern.
#[derive(Debug, Clone, Default)]
pub struct SequenceOutcome {
    /// Sequences completed by this event.
    pub matches: Vec<SequenceMatch>,
    /// Sequence instances expired while handling this event.
    pub expired: Vec<SequenceExpired>,
}

/// Error produced by [`SequenceMatcher::add_pattern`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SequencePatternError {
    /// A sequence pattern must have at least one step.
    #[error("sequence pattern must have at least one step")]
    Empty,
    /// The window must be positive.
    #[error("sequence pattern's `within` must be greater than zero")]
    ZeroWindow,
}

/// Sequence ("ordered list of events within a window") temporal matcher.
pub struct SequenceMatcher {
    clock: SharedClock,
    patterns: HashMap<PatternId, SequencePattern>,
    instances: HashMap<TemporalInstanceId, SequenceInstance>,
    by_pattern: HashMap<PatternId, HashSet<TemporalInstanceId>>,
    by_pattern_group: HashMap<(PatternId, String), TemporalInstanceId>,
    next_seq: u64,
}

impl SequenceMatcher {
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
        TemporalInstanceId::new(format!("seq-{}", self.next_seq))
    }

    /// Registers (or replaces) a sequence pattern.
    ///
    /// # Errors
    /// Returns [`SequencePatternError`] if `steps` is empty or `within_ms` is zero.
    pub fn add_pattern(&mut self, id: PatternId, pattern: SequencePattern) -> Result<(), SequencePatternError> {
        if pattern.steps.is_empty() {
            return Err(SequencePatternError::Empty);
        }
        if pattern.within_ms == 0 {
            return Err(SequencePatternError::ZeroWindow);
        }
        self.remove_pattern(&id);
        self.patterns.insert(id, pattern);
        Ok(())
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

    /// Returns the number of in-flight (`Matching`) instances, for tests that
    /// assert "active-instance count returns to 0" (spec §8 scenario 1).
    #[must_use]
    pub fn matching_instance_count(&self) -> usize {
        self.instances.values().filter(|i| i.state == SequenceState::Matching).count()
    }

    fn remove_instance(&mut self, instance_id: &TemporalInstanceId) -> Option<SequenceInstance> {
        let instance = self.instances.remove(instance_id)?;
        if let Some(bucket) = self.by_pattern.get_mut(&instance.pattern_id) {
            bucket.remove(instance_id);
        }
        self.by_pattern_group.remove(&(instance.pattern_id.clone(), instance.group_key.clone()));
        Some(instance)
    }

    /// Feeds one event through every registered pattern.
    pub fn process_event(&mut self, event: &Event) -> SequenceOutcome {
        let now = self.clock.now_ms();
        let mut outcome = SequenceOutcome::default();

        let pattern_ids: Vec<PatternId> = self.patterns.keys().cloned().collect();
        for pattern_id in pattern_ids {
            self.process_pattern(&pattern_id, event, now, &mut outcome);
        }
        outcome
    }

    fn process_pattern(&mut self, pattern_id: &PatternId, event: &Event, now: u64, outcome: &mut SequenceOutcome) {
        let Some(pattern) = self.patterns.get(pattern_id).cloned() else { return };
        let key = group_key(event, pattern.group_by.as_deref());
        let slot = (pattern_id.clone(), key.clone());

        let mut has_instance = false;
        if let Some(instance_id) = self.by_pattern_group.get(&slot).cloned() {
            has_instance = self.advance_existing(&instance_id, &pattern, event, now, outcome);
        }

        if !has_instance && pattern.steps[0].matches(event) {
            self.start_instance(pattern_id, &pattern, key, event, now, outcome);
        }
    }

    /// Returns true if an instance still occupies the (pattern, group) slot
    /// after this call.
    fn advance_existing(
        &mut self,
        instance_id: &TemporalInstanceId,
        pattern: &SequencePattern,
        event: &Event,
        now: u64,
        outcome: &mut SequenceOutcome,
    ) -> bool {
        let Some(instance) = self.instances.get(instance_id) else { return false };

        if now > instance.expires_at {
            if let Some(mut removed) = self.remove_instance(instance_id) {
                removed.state = SequenceState::Expired;
                outcome.expired.push(SequenceExpired {
                    pattern_id: removed.pattern_id,
                    group_key: removed.group_key,
                    matched: removed.matched,
                });
            }
            return false;
        }

        let next_index = instance.matched.len();
        if pattern.steps[next_index].matches(event) {
            let instance = self.instances.get_mut(instance_id).unwrap_or_else(|| unreachable!());
            instance.matched.push(event.clone());
            if instance.matched.len() == pattern.steps.len() {
                let completed = self.remove_instance(instance_id).unwrap_or_else(|| unreachable!());
                outcome.matches.push(SequenceMatch {
                    pattern_id: completed.pattern_id,
                    group_key: completed.group_key,
                    events: completed.matched,
                });
                return false;
            }
            return true;
        }

        if pattern.strict {
            self.remove_instance(instance_id);
            return false;
        }
        true
    }

    fn start_instance(
        &mut self,
        pattern_id: &PatternId,
        pattern: &SequencePattern,
        key: String,
        event: &Event,
        now: u64,
        outcome: &mut SequenceOutcome,
    ) {
        let instance_id = self.fresh_instance_id();
        let matched = vec![event.clone()];

        if matched.len() == pattern.steps.len() {
            outcome.matches.push(SequenceMatch { pattern_id: pattern_id.clone(), group_key: key, events: matched });
            return;
        }

        let instance = SequenceInstance {
            id: instance_id.clone(),
            pattern_id: pattern_id.clone(),
            group_key: key.clone(),
            state: SequenceState::Matching,
            matched,
            started_at: now,
            expires_at: now + pattern.within_ms,
        };
        self.by_pattern.entry(pattern_id.clone()).or_default().insert(instance_id.clone());
        self.by_pattern_group.insert((pattern_id.clone(), key), instance_id.clone());
        self.instances.insert(instance_id, instance);
    }
}
