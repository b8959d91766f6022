// rules-core/src/event.rs
// ============================================================================
// Module: Event Data Model
// Description: The `Event` record consumed by triggers and temporal matchers.
// Purpose: Define the immutable, dot-topic-addressed stimulus shape.
// Dependencies: crate::identifiers, serde_json::Value
// ============================================================================

//! ## Overview
//! Events are immutable once constructed and are consumed once per
//! applicable rule (spec §3). Topics are dot-segmented (`order.created`);
//! the segment grammar lives in `rules_logic::pattern`.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::CorrelationId;
use crate::identifiers::EventId;

/// An immutable, topic-addressed stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// Dot-segmented topic, e.g. `order.created`.
    pub topic: String,
    /// Event payload.
    pub data: Value,
    /// Monotonic milliseconds timestamp.
    pub timestamp: u64,
    /// Who emitted this event (`"system"`, `"rule"`, or a caller-supplied tag).
    pub source: String,
    /// Caller-supplied identifier linking causally related work.
    pub correlation_id: Option<CorrelationId>,
}

impl Event {
    /// Builds a new event with the given identifier.
    #[must_use]
    pub fn new(
        id: EventId,
        topic: impl Into<String>,
        data: Value,
        timestamp: u64,
        source: impl Into<String>,
        correlation_id: Option<CorrelationId>,
    ) -> Self {
        Self { id, topic: topic.into(), data, timestamp, source: source.into(), correlation_id }
    }
}
