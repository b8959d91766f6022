// rules-engine/src/temporal/count.rs
// ============================================================================
// Module: Count Matcher
// Description: "N matching events within a window" temporal pattern.
// Purpose: Implement spec §4.3.3 exactly: sliding re-notifies on every
//          matching event while the condition holds; tumbling evaluates once
//          at window end.
// Dependencies: crate::{clock::SharedClock, temporal::matcher::EventMatcher},
//               rules_core::{Event, PatternId, TemporalInstanceId}
// ============================================================================

//! ## Overview
//! Sliding count patterns keep a per-group buffer pruned to the window on
//! every matching event and re-evaluate the threshold each time. Tumbling
//! patterns align to `floor(now/window)*window` and only evaluate once,
//! when the orchestrator calls [`CountMatcher::handle_window_end`] — the
//! same scheduler hand-off shape as [`crate::temporal::absence::AbsenceMatcher::handle_timeout`].

use std::collections::HashMap;

use rules_core::Event;
use rules_core::PatternId;
use rules_core::TemporalInstanceId;

use crate::clock::SharedClock;
use crate::temporal::matcher::EventMatcher;
use crate::temporal::matcher::group_key;

/// Comparison applied between the observed count and `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Observed count is greater than or equal to the threshold.
    Gte,
    /// Observed count is less than or equal to the threshold.
    Lte,
    /// Observed count equals the threshold.
    Eq,
}

impl Comparison {
    fn holds(self, observed: u64, threshold: u64) -> bool {
        match self {
            Self::Gte => observed >= threshold,
            Self::Lte => observed <= threshold,
            Self::Eq => observed == threshold,
        }
    }
}

/// A registered count pattern.
#[derive(Debug, Clone)]
pub struct CountPattern {
    /// Matcher every counted event must satisfy.
    pub event: EventMatcher,
    /// The threshold compared against the observed count.
    pub threshold: u64,
    /// The comparison applied.
    pub comparison: Comparison,
    /// Window size in milliseconds.
    pub window_ms: u64,
    /// Dotted path used to compute a per-event grouping key.
    pub group_by: Option<String>,
    /// `true` for a continuously re-evaluated sliding window; `false`
    /// (the default) for a tumbling window evaluated once at window end.
    pub sliding: bool,
}

/// A count match: the threshold held for a (pattern, group).
#[derive(Debug, Clone)]
pub struct CountMatch {
    /// The pattern that matched.
    pub pattern_id: PatternId,
    /// The grouping key the match occurred under.
    pub group_key: String,
    /// The observed count at match time.
    pub count: u64,
}

/// A tumbling window that elapsed without the threshold holding.
#[derive(Debug, Clone)]
pub struct CountWindowExpired {
    /// The pattern whose window expired.
    pub pattern_id: PatternId,
    /// The grouping key of the expired window.
    pub group_key: String,
    /// The observed count when the window closed.
    pub count: u64,
}

/// A newly opened tumbling window the orchestrator must schedule a
/// window-end callback for.
#[derive(Debug, Clone)]
pub struct PendingWindow {
    /// The instance to evaluate at window end.
    pub instance_id: TemporalInstanceId,
    /// Milliseconds to wait before calling `handle_window_end`.
    pub delay_ms: u64,
}

/// The result of feeding one event through every registered count pattern.
#[derive(Debug, Clone, Default)]
pub struct CountOutcome {
    /// Matches produced by sliding evaluation of this event.
    pub matches: Vec<CountMatch>,
    /// Tumbling windows newly opened by this event.
    pub new_windows: Vec<PendingWindow>,
}

struct SlidingBuffer {
    events: Vec<Event>,
}

struct TumblingWindow {
    instance_id: TemporalInstanceId,
    window_start: u64,
    count: u64,
}

/// Count ("N matching events in a window") temporal matcher.
pub struct CountMatcher {
    clock: SharedClock,
    patterns: HashMap<PatternId, CountPattern>,
    sliding: HashMap<(PatternId, String), SlidingBuffer>,
    tumbling: HashMap<(PatternId, String), TumblingWindow>,
    windows_by_instance: HashMap<TemporalInstanceId, (PatternId, String)>,
    next_seq: u64,
}

impl CountMatcher {
    /// Builds an empty matcher.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            patterns: HashMap::new(),
            sliding: HashMap::new(),
            tumbling: HashMap::new(),
            windows_by_instance: HashMap::new(),
            next_seq: 0,
        }
    }

    fn fresh_instance_id(&mut self) -> TemporalInstanceId {
        self.next_seq += 1;
        TemporalInstanceId::new(format!("count-{}", self.next_seq))
    }

    /// Registers (or replaces) a count pattern.
    pub fn add_pattern(&mut self, id: PatternId, pattern: CountPattern) {
        self.remove_pattern(&id);
        self.patterns.insert(id, pattern);
    }

    /// Removes a pattern and every instance of it.
    pub fn remove_pattern(&mut self, id: &PatternId) {
        self.patterns.remove(id);
        self.sliding.retain(|(p, _), _| p != id);
        self.tumbling.retain(|(p, _), _| p != id);
        self.windows_by_instance.retain(|_, (p, _)| p != id);
    }

    /// Discards every pattern and instance.
    pub fn reset(&mut self) {
        self.patterns.clear();
        self.sliding.clear();
        self.tumbling.clear();
        self.windows_by_instance.clear();
    }

    /// Discards every instance, keeping registered patterns.
    pub fn clear(&mut self) {
        self.sliding.clear();
        self.tumbling.clear();
        self.windows_by_instance.clear();
    }

    /// Feeds one event through every registered pattern.
    pub fn process_event(&mut self, event: &Event) -> CountOutcome {
        let now = self.clock.now_ms();
        let mut outcome = CountOutcome::default();
        let pattern_ids: Vec<PatternId> = self.patterns.keys().cloned().collect();
        for pattern_id in pattern_ids {
            self.process_pattern(&pattern_id, event, now, &mut outcome);
        }
        outcome
    }

    fn process_pattern(&mut self, pattern_id: &PatternId, event: &Event, now: u64, outcome: &mut CountOutcome) {
        let Some(pattern) = self.patterns.get(pattern_id).cloned() else { return };
        if !pattern.event.matches(event) {
            return;
        }
        let key = group_key(event, pattern.group_by.as_deref());

        if pattern.sliding {
            self.process_sliding(pattern_id, &pattern, key, event, now, outcome);
        } else {
            self.process_tumbling(pattern_id, &pattern, key, now, outcome);
        }
    }

    fn process_sliding(
        &mut self,
        pattern_id: &PatternId,
        pattern: &CountPattern,
        key: String,
        event: &Event,
        now: u64,
        outcome: &mut CountOutcome,
    ) {
        let slot = (pattern_id.clone(), key.clone());
        let buffer = self.sliding.entry(slot).or_insert_with(|| SlidingBuffer { events: Vec::new() });
        buffer.events.push(event.clone());
        let window_start = now.saturating_sub(pattern.window_ms);
        buffer.events.retain(|e| e.timestamp >= window_start);

        let count = buffer.events.len() as u64;
        if pattern.comparison.holds(count, pattern.threshold) {
            outcome.matches.push(CountMatch { pattern_id: pattern_id.clone(), group_key: key, count });
        }
    }

    fn process_tumbling(
        &mut self,
        pattern_id: &PatternId,
        pattern: &CountPattern,
        key: String,
        now: u64,
        outcome: &mut CountOutcome,
    ) {
        let slot = (pattern_id.clone(), key.clone());
        let window_start = (now / pattern.window_ms) * pattern.window_ms;

        let needs_new_window = self.tumbling.get(&slot).is_none_or(|w| w.window_start != window_start);
        if needs_new_window {
            let instance_id = self.fresh_instance_id();
            self.windows_by_instance.insert(instance_id.clone(), slot.clone());
            self.tumbling.insert(slot.clone(), TumblingWindow { instance_id: instance_id.clone(), window_start, count: 0 });
            let delay_ms = (window_start + pattern.window_ms).saturating_sub(now);
            outcome.new_windows.push(PendingWindow { instance_id, delay_ms });
        }

        if let Some(window) = self.tumbling.get_mut(&slot) {
            window.count += 1;
        }
    }

    /// Called by the scheduler when a tumbling window's end time arrives.
    ///
    /// Evaluates the threshold once; returns a match on success or an
    /// expiry record otherwise. Returns `None` if the window instance was
    /// already superseded by a newer one (and thus no longer tracked).
    pub fn handle_window_end(
        &mut self,
        instance_id: &TemporalInstanceId,
    ) -> Option<Result<CountMatch, CountWindowExpired>> {
        let slot = self.windows_by_instance.remove(instance_id)?;
        let window = self.tumbling.remove(&slot);
        let (pattern_id, group_key) = slot;
        let count = window.map_or(0, |w| w.count);
        let pattern = self.patterns.get(&pattern_id).cloned();

        Some(match pattern {
            Some(pattern) if pattern.comparison.holds(count, pattern.threshold) => {
                Ok(CountMatch { pattern_id, group_key, count })
            }
            _ => Err(CountWindowExpired { pattern_id, group_key, count }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rules_core::EventId;
    use serde_json::json;
    use std::sync::Arc;

    fn event(order: &str, user: &str, at: u64) -> Event {
        Event::new(EventId::new(order), "login.failed", json!({"userId": user}), at, "system", None)
    }

    #[test]
    fn sliding_matches_on_third_and_renotifies_on_fourth() {
        let clock = Arc::new(ManualClock::new(0));
        let mut m = CountMatcher::new(Arc::clone(&clock));
        m.add_pattern(
            PatternId::new("p1"),
            CountPattern {
                event: EventMatcher::topic("login.failed"),
                threshold: 3,
                comparison: Comparison::Gte,
                window_ms: 300_000,
                group_by: Some("userId".to_string()),
                sliding: true,
            },
        );

        assert!(m.process_event(&event("e1", "u1", 0)).matches.is_empty());
        clock.set(1000);
        assert!(m.process_event(&event("e2", "u1", 1000)).matches.is_empty());
        clock.set(2000);
        let outcome = m.process_event(&event("e3", "u1", 2000));
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].count, 3);

        clock.set(3000);
        let outcome = m.process_event(&event("e4", "u1", 3000));
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].count, 4);
    }

    #[test]
    fn sliding_prunes_events_outside_window() {
        let clock = Arc::new(ManualClock::new(0));
        let mut m = CountMatcher::new(Arc::clone(&clock));
        m.add_pattern(
            PatternId::new("p1"),
            CountPattern {
                event: EventMatcher::topic("login.failed"),
                threshold: 2,
                comparison: Comparison::Gte,
                window_ms: 1000,
                group_by: None,
                sliding: true,
            },
        );
        m.process_event(&event("e1", "u1", 0));
        clock.set(2000);
        let outcome = m.process_event(&event("e2", "u1", 2000));
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn tumbling_evaluates_once_at_window_end() {
        let clock = Arc::new(ManualClock::new(0));
        let mut m = CountMatcher::new(Arc::clone(&clock));
        m.add_pattern(
            PatternId::new("p1"),
            CountPattern {
                event: EventMatcher::topic("login.failed"),
                threshold: 2,
                comparison: Comparison::Gte,
                window_ms: 1000,
                group_by: None,
                sliding: false,
            },
        );
        let outcome = m.process_event(&event("e1", "u1", 0));
        assert_eq!(outcome.new_windows.len(), 1);
        let instance_id = outcome.new_windows[0].instance_id.clone();
        m.process_event(&event("e2", "u1", 500));

        let result = m.handle_window_end(&instance_id).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.unwrap().count, 2);
    }
}
