// rules-engine/src/temporal/aggregate.rs
// ============================================================================
// Module: Aggregate Matcher
// Description: "Aggregate function over a numeric field within a window" pattern.
// Purpose: Implement spec §4.3.4 exactly: sliding (default) recomputes on
//          every append; tumbling evaluates once at window end; non-numeric
//          extractions are silently skipped.
// Dependencies: crate::{clock::SharedClock, temporal::matcher::EventMatcher},
//               rules_core::{Event, PatternId, TemporalInstanceId}
// ============================================================================

//! ## Overview
//! Mirrors [`crate::temporal::count::CountMatcher`]'s windowing shape but
//! extracts a numeric value per event instead of only counting them. Empty
//! buffers evaluate the identity element of their function: 0 for
//! `sum`/`avg`, +∞ for `min`, −∞ for `max`, 0 for `count`.

use std::collections::HashMap;

use rules_core::Event;
use rules_core::PatternId;
use rules_core::TemporalInstanceId;

use crate::clock::SharedClock;
use crate::temporal::count::Comparison;
use crate::temporal::matcher::EventMatcher;
use crate::temporal::matcher::group_key;

/// The aggregate function computed over the extracted numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Sum of values.
    Sum,
    /// Arithmetic mean of values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Count of (non-numeric-skipped) values.
    Count,
}

impl AggregateFunction {
    fn compute(self, values: &[f64]) -> f64 {
        match self {
            Self::Sum => values.iter().sum(),
            Self::Avg => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Count => values.len() as f64,
        }
    }
}

/// A registered aggregate pattern.
#[derive(Debug, Clone)]
pub struct AggregatePattern {
    /// Matcher every aggregated event must satisfy.
    pub event: EventMatcher,
    /// Dotted path to the numeric field extracted from each matching event.
    pub field: String,
    /// The aggregate function applied to the extracted values.
    pub function: AggregateFunction,
    /// The threshold compared against the computed aggregate.
    pub threshold: f64,
    /// The comparison applied.
    pub comparison: Comparison,
    /// Window size in milliseconds.
    pub window_ms: u64,
    /// Dotted path used to compute a per-event grouping key.
    pub group_by: Option<String>,
    /// `true` (the default) for a continuously re-evaluated sliding window;
    /// `false` for a tumbling window evaluated once at window end.
    pub sliding: bool,
}

impl Comparison {
    fn holds_f64(self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::Gte => observed >= threshold,
            Self::Lte => observed <= threshold,
            Self::Eq => (observed - threshold).abs() < f64::EPSILON,
        }
    }
}

/// An aggregate match: the threshold held for a (pattern, group).
#[derive(Debug, Clone)]
pub struct AggregateMatch {
    /// The pattern that matched.
    pub pattern_id: PatternId,
    /// The grouping key the match occurred under.
    pub group_key: String,
    /// The computed aggregate value at match time.
    pub value: f64,
}

/// A tumbling window that elapsed without the threshold holding.
#[derive(Debug, Clone)]
pub struct AggregateWindowExpired {
    /// The pattern whose window expired.
    pub pattern_id: PatternId,
    /// The grouping key of the expired window.
    pub group_key: String,
    /// The computed aggregate value when the window closed.
    pub value: f64,
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

/// The result of feeding one event through every registered aggregate pattern.
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    /// Matches produced by sliding evaluation of this event.
    pub matches: Vec<AggregateMatch>,
    /// Tumbling windows newly opened by this event.
    pub new_windows: Vec<PendingWindow>,
}

struct SlidingBuffer {
    samples: Vec<(u64, f64)>,
}

struct TumblingWindow {
    window_start: u64,
    samples: Vec<f64>,
}

/// Aggregate ("function over a numeric field within a window") temporal matcher.
pub struct AggregateMatcher {
    clock: SharedClock,
    patterns: HashMap<PatternId, AggregatePattern>,
    sliding: HashMap<(PatternId, String), SlidingBuffer>,
    tumbling: HashMap<(PatternId, String), TumblingWindow>,
    windows_by_instance: HashMap<TemporalInstanceId, (PatternId, String)>,
    next_seq: u64,
}

impl AggregateMatcher {
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
        TemporalInstanceId::new(format!("agg-{}", self.next_seq))
    }

    /// Registers (or replaces) an aggregate pattern.
    pub fn add_pattern(&mut self, id: PatternId, pattern: AggregatePattern) {
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

    fn extract(event: &Event, field: &str) -> Option<f64> {
        rules_logic::get_path(&event.data, field)?.as_f64()
    }

    /// Feeds one event through every registered pattern.
    pub fn process_event(&mut self, event: &Event) -> AggregateOutcome {
        let now = self.clock.now_ms();
        let mut outcome = AggregateOutcome::default();
        let pattern_ids: Vec<PatternId> = self.patterns.keys().cloned().collect();
        for pattern_id in pattern_ids {
            self.process_pattern(&pattern_id, event, now, &mut outcome);
        }
        outcome
    }

    fn process_pattern(&mut self, pattern_id: &PatternId, event: &Event, now: u64, outcome: &mut AggregateOutcome) {
        let Some(pattern) = self.patterns.get(pattern_id).cloned() else { return };
        if !pattern.event.matches(event) {
            return;
        }
        // Count may legitimately proceed even when the field is non-numeric
        // (it counts matching events, not numeric samples), but every other
        // function needs an extractable numeric value.
        let extracted = Self::extract(event, &pattern.field);
        if extracted.is_none() && pattern.function != AggregateFunction::Count {
            return;
        }
        let key = group_key(event, pattern.group_by.as_deref());

        if pattern.sliding {
            self.process_sliding(pattern_id, &pattern, key, event.timestamp, extracted, now, outcome);
        } else {
            self.process_tumbling(pattern_id, &pattern, key, extracted, now, outcome);
        }
    }

    fn process_sliding(
        &mut self,
        pattern_id: &PatternId,
        pattern: &AggregatePattern,
        key: String,
        timestamp: u64,
        extracted: Option<f64>,
        now: u64,
        outcome: &mut AggregateOutcome,
    ) {
        let slot = (pattern_id.clone(), key.clone());
        let buffer = self.sliding.entry(slot).or_insert_with(|| SlidingBuffer { samples: Vec::new() });
        if let Some(value) = extracted {
            buffer.samples.push((timestamp, value));
        } else if pattern.function == AggregateFunction::Count {
            buffer.samples.push((timestamp, 0.0));
        }
        let window_start = now.saturating_sub(pattern.window_ms);
        buffer.samples.retain(|(ts, _)| *ts >= window_start);

        let values: Vec<f64> = buffer.samples.iter().map(|(_, v)| *v).collect();
        let computed = pattern.function.compute(&values);
        if pattern.comparison.holds_f64(computed, pattern.threshold) {
            outcome.matches.push(AggregateMatch { pattern_id: pattern_id.clone(), group_key: key, value: computed });
        }
    }

    fn process_tumbling(
        &mut self,
        pattern_id: &PatternId,
        pattern: &AggregatePattern,
        key: String,
        extracted: Option<f64>,
        now: u64,
        outcome: &mut AggregateOutcome,
    ) {
        let slot = (pattern_id.clone(), key.clone());
        let window_start = (now / pattern.window_ms) * pattern.window_ms;

        let needs_new_window = self.tumbling.get(&slot).is_none_or(|w| w.window_start != window_start);
        if needs_new_window {
            let instance_id = self.fresh_instance_id();
            self.windows_by_instance.insert(instance_id.clone(), slot.clone());
            self.tumbling.insert(slot.clone(), TumblingWindow { window_start, samples: Vec::new() });
            let delay_ms = (window_start + pattern.window_ms).saturating_sub(now);
            outcome.new_windows.push(PendingWindow { instance_id, delay_ms });
        }

        if let Some(window) = self.tumbling.get_mut(&slot) {
            if let Some(value) = extracted {
                window.samples.push(value);
            } else if pattern.function == AggregateFunction::Count {
                window.samples.push(0.0);
            }
        }
    }

    /// Called by the scheduler when a tumbling window's end time arrives.
    pub fn handle_window_end(
        &mut self,
        instance_id: &TemporalInstanceId,
    ) -> Option<Result<AggregateMatch, AggregateWindowExpired>> {
        let slot = self.windows_by_instance.remove(instance_id)?;
        let window = self.tumbling.remove(&slot);
        let (pattern_id, group_key) = slot;
        let pattern = self.patterns.get(&pattern_id).cloned();
        let computed = match (&pattern, window) {
            (Some(pattern), Some(window)) => pattern.function.compute(&window.samples),
            _ => 0.0,
        };

        Some(match pattern {
            Some(pattern) if pattern.comparison.holds_f64(computed, pattern.threshold) => {
                Ok(AggregateMatch { pattern_id, group_key, value: computed })
            }
            _ => Err(AggregateWindowExpired { pattern_id, group_key, value: computed }),
        })
    }
}
