// rules-engine/src/temporal/mod.rs
// ============================================================================
// Module: Temporal
// Description: The four temporal pattern matchers plus the shared event matcher.
// Purpose: Give the orchestrator one `TemporalMatchers` aggregator that feeds
//          every inbound event to all four matchers (spec §4.3: "temporal
//          matchers receive every event and may synthesise their own events
//          on match").
// Dependencies: rules_core::{Event, PatternId, TemporalInstanceId}
// ============================================================================

//! ## Overview
//! Each matcher (sequence, absence, count, aggregate) is independently
//! testable and owns its own instance bookkeeping; [`TemporalMatchers`] is a
//! thin façade that dispatches one inbound event to all four and collects
//! every outcome, plus the scheduler hand-off callbacks the orchestrator must
//! wire to real timers.

pub mod absence;
pub mod aggregate;
pub mod count;
pub mod matcher;
pub mod sequence;

pub use absence::AbsenceMatch;
pub use absence::AbsenceMatcher;
pub use absence::AbsenceOutcome;
pub use absence::AbsencePattern;
pub use aggregate::AggregateFunction;
pub use aggregate::AggregateMatch;
pub use aggregate::AggregateMatcher;
pub use aggregate::AggregateOutcome;
pub use aggregate::AggregatePattern;
pub use count::Comparison;
pub use count::CountMatch;
pub use count::CountMatcher;
pub use count::CountOutcome;
pub use count::CountPattern;
pub use matcher::EventMatcher;
pub use matcher::group_key;
pub use sequence::SequenceExpired;
pub use sequence::SequenceMatch;
pub use sequence::SequenceMatcher;
pub use sequence::SequenceOutcome;
pub use sequence::SequencePattern;
pub use sequence::SequencePatternError;

use rules_core::Event;

use crate::clock::SharedClock;

/// Everything that happened when one event was fed to all four temporal
/// matchers at once.
#[derive(Debug, Clone, Default)]
pub struct TemporalEventOutcome {
    /// Sequence matches and expirations produced by this event.
    pub sequence: SequenceOutcome,
    /// Absence completions produced by this event (opportunistic sweep).
    pub absence: AbsenceOutcome,
    /// Count matches and newly opened tumbling windows.
    pub count: CountOutcome,
    /// Aggregate matches and newly opened tumbling windows.
    pub aggregate: AggregateOutcome,
}

/// Owns all four temporal matchers and fans one event out to each.
pub struct TemporalMatchers {
    /// The sequence matcher.
    pub sequence: SequenceMatcher,
    /// The absence matcher.
    pub absence: AbsenceMatcher,
    /// The count matcher.
    pub count: CountMatcher,
    /// The aggregate matcher.
    pub aggregate: AggregateMatcher,
}

impl TemporalMatchers {
    /// Builds four empty matchers sharing one clock.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            sequence: SequenceMatcher::new(clock.clone()),
            absence: AbsenceMatcher::new(clock.clone()),
            count: CountMatcher::new(clock.clone()),
            aggregate: AggregateMatcher::new(clock),
        }
    }

    /// Feeds one event to every matcher and collects the combined outcome.
    pub fn process_event(&mut self, event: &Event) -> TemporalEventOutcome {
        TemporalEventOutcome {
            sequence: self.sequence.process_event(event),
            absence: self.absence.process_event(event),
            count: self.count.process_event(event),
            aggregate: self.aggregate.process_event(event),
        }
    }

    /// Discards every pattern and instance across all four matchers.
    pub fn reset(&mut self) {
        self.sequence.reset();
        self.absence.reset();
        self.count.reset();
        self.aggregate.reset();
    }
}
