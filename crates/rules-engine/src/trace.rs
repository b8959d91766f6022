// rules-engine/src/trace.rs
// ============================================================================
// Module: Trace Collector
// Description: Bounded ring buffer of debug trace entries with correlation/
//              rule/type indexes and subscriber fan-out.
// Purpose: Implement spec §4.6's Trace Collector half: every pipeline step
//          emits a `DebugTraceEntry`; the collector is the single place that
//          stores, indexes, and republishes them.
// Dependencies: crate::clock::SharedClock, crate::interfaces::DiagnosticSink,
//               rules_core::{CorrelationId, RuleId}
// ============================================================================

//! ## Overview
//! The ring is bounded by `maxEntries`; once exceeded, the oldest ~10% are
//! evicted from the ring and every secondary index in the same pass (spec
//! §4.6, §8: "every index contains only live entry ids"). Subscriber
//! callbacks run inline and must never panic the collector — exceptions are
//! caught and logged, mirroring the Fact Store's change-listener contract.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde_json::Value;

use rules_core::CorrelationId;
use rules_core::RuleId;

use crate::clock::SharedClock;
use crate::interfaces::DiagnosticLevel;
use crate::interfaces::DiagnosticSink;

/// The kind of pipeline step a [`DebugTraceEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEntryType {
    /// A rule's trigger matched and it was selected for evaluation.
    RuleMatched,
    /// A rule was skipped (e.g. a `Data Resolver` requirement failed under `skip`).
    RuleSkipped,
    /// A rule's conditions were evaluated, true or false.
    ConditionsEvaluated,
    /// An action began executing.
    ActionStarted,
    /// An action completed successfully.
    ActionCompleted,
    /// An action failed.
    ActionFailed,
    /// A fact was created, updated, or deleted.
    FactChanged,
    /// An event was emitted, by a rule or the host.
    EventEmitted,
    /// A temporal matcher produced a match or expiration.
    TemporalMatch,
    /// A timer was armed.
    TimerArmed,
    /// A timer was cancelled.
    TimerCancelled,
}

/// One recorded pipeline step (spec §3 `DebugTraceEntry`).
#[derive(Debug, Clone)]
pub struct DebugTraceEntry {
    /// Unique entry identifier, assigned by the collector unless overridden.
    pub id: String,
    /// Monotonic milliseconds timestamp, assigned by the collector unless overridden.
    pub timestamp: u64,
    /// What kind of step this entry records.
    pub entry_type: TraceEntryType,
    /// Correlation id propagated from the originating stimulus, if any.
    pub correlation_id: Option<CorrelationId>,
    /// Identifier of the entry that causally led to this one, if any.
    pub causation_id: Option<String>,
    /// Rule this entry concerns, if any.
    pub rule_id: Option<RuleId>,
    /// Display name of `rule_id`'s rule, if any.
    pub rule_name: Option<String>,
    /// Free-form structured detail payload.
    pub details: Value,
    /// How long the recorded step took, if timed.
    pub duration_ms: Option<u64>,
}

/// A not-yet-stamped trace entry; the collector assigns `id`/`timestamp`
/// unless the caller has already set them (spec §4.6: "stamps id and
/// timestamp (unless overridden)").
#[derive(Debug, Clone, Default)]
pub struct NewTraceEntry {
    /// Pre-assigned id, if the caller wants to control it (tests, replays).
    pub id: Option<String>,
    /// Pre-assigned timestamp, if the caller wants to control it.
    pub timestamp: Option<u64>,
    /// What kind of step this entry records. Required.
    pub entry_type: Option<TraceEntryType>,
    /// Correlation id propagated from the originating stimulus, if any.
    pub correlation_id: Option<CorrelationId>,
    /// Identifier of the entry that causally led to this one, if any.
    pub causation_id: Option<String>,
    /// Rule this entry concerns, if any.
    pub rule_id: Option<RuleId>,
    /// Display name of `rule_id`'s rule, if any.
    pub rule_name: Option<String>,
    /// Free-form structured detail payload.
    pub details: Value,
    /// How long the recorded step took, if timed.
    pub duration_ms: Option<u64>,
}

impl NewTraceEntry {
    /// Builds a new trace entry of the given type with no other fields set.
    #[must_use]
    pub fn new(entry_type: TraceEntryType) -> Self {
        Self { entry_type: Some(entry_type), details: Value::Null, ..Default::default() }
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation(mut self, correlation_id: Option<CorrelationId>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Sets the rule id and name.
    #[must_use]
    pub fn with_rule(mut self, rule_id: RuleId, rule_name: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id);
        self.rule_name = Some(rule_name.into());
        self
    }

    /// Sets the detail payload.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Sets the recorded duration.
    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// A subscriber callback, fired inline for every recorded entry.
pub type TraceSubscriber = Box<dyn Fn(&DebugTraceEntry) + Send + Sync>;

struct TraceState {
    ring: VecDeque<DebugTraceEntry>,
    by_correlation: HashMap<String, HashSet<String>>,
    by_rule: HashMap<String, HashSet<String>>,
    by_type: HashMap<TraceEntryType, HashSet<String>>,
}

impl TraceState {
    fn new() -> Self {
        Self { ring: VecDeque::new(), by_correlation: HashMap::new(), by_rule: HashMap::new(), by_type: HashMap::new() }
    }

    fn index_insert(&mut self, entry: &DebugTraceEntry) {
        if let Some(correlation_id) = &entry.correlation_id {
            self.by_correlation.entry(correlation_id.to_string()).or_default().insert(entry.id.clone());
        }
        if let Some(rule_id) = &entry.rule_id {
            self.by_rule.entry(rule_id.to_string()).or_default().insert(entry.id.clone());
        }
        self.by_type.entry(entry.entry_type).or_default().insert(entry.id.clone());
    }

    fn index_remove(&mut self, entry: &DebugTraceEntry) {
        if let Some(correlation_id) = &entry.correlation_id {
            if let Some(bucket) = self.by_correlation.get_mut(correlation_id.as_str()) {
                bucket.remove(&entry.id);
                if bucket.is_empty() {
                    self.by_correlation.remove(correlation_id.as_str());
                }
            }
        }
        if let Some(rule_id) = &entry.rule_id {
            if let Some(bucket) = self.by_rule.get_mut(rule_id.as_str()) {
                bucket.remove(&entry.id);
                if bucket.is_empty() {
                    self.by_rule.remove(rule_id.as_str());
                }
            }
        }
        if let Some(bucket) = self.by_type.get_mut(&entry.entry_type) {
            bucket.remove(&entry.id);
            if bucket.is_empty() {
                self.by_type.remove(&entry.entry_type);
            }
        }
    }

    /// Evicts the oldest ~10% of the ring (at least one), removing every
    /// evicted entry from every index in the same pass (spec §4.6/§8).
    fn evict_watermark(&mut self, max_entries: usize) {
        if self.ring.len() <= max_entries {
            return;
        }
        let evict_count = (max_entries / 10).max(1).min(self.ring.len());
        for _ in 0..evict_count {
            if let Some(evicted) = self.ring.pop_front() {
                self.index_remove(&evicted);
            }
        }
    }
}

/// Bounded ring buffer of [`DebugTraceEntry`] with secondary indexes and
/// inline subscriber fan-out (spec §4.6).
pub struct TraceCollector {
    clock: SharedClock,
    enabled: bool,
    max_entries: usize,
    state: Mutex<TraceState>,
    subscribers: Mutex<Vec<(u64, TraceSubscriber)>>,
    next_subscriber_id: AtomicU64,
    next_entry_id: AtomicU64,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl TraceCollector {
    /// Builds a trace collector (spec §6 config: `enabled` defaults `false`,
    /// `maxEntries` defaults `10000`).
    #[must_use]
    pub fn new(clock: SharedClock, enabled: bool, max_entries: usize, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            clock,
            enabled,
            max_entries: max_entries.max(1),
            state: Mutex::new(TraceState::new()),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            next_entry_id: AtomicU64::new(0),
            diagnostics,
        }
    }

    /// True if this collector is actively recording (a disabled collector
    /// still accepts `record` calls but discards them, so callers need not
    /// branch on this themselves).
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records one trace entry, stamping `id`/`timestamp` unless the caller
    /// already set them, updating every index, and fanning out to
    /// subscribers. Returns the stamped entry (even when disabled, so
    /// callers — e.g. the Debug Controller — can still test breakpoints
    /// against entries that were never stored).
    pub fn record(&self, new_entry: NewTraceEntry) -> DebugTraceEntry {
        let id = new_entry.id.unwrap_or_else(|| format!("trace-{}", self.next_entry_id.fetch_add(1, Ordering::SeqCst)));
        let timestamp = new_entry.timestamp.unwrap_or_else(|| self.clock.now_ms());
        let entry = DebugTraceEntry {
            id,
            timestamp,
            entry_type: new_entry.entry_type.unwrap_or(TraceEntryType::RuleMatched),
            correlation_id: new_entry.correlation_id,
            causation_id: new_entry.causation_id,
            rule_id: new_entry.rule_id,
            rule_name: new_entry.rule_name,
            details: new_entry.details,
            duration_ms: new_entry.duration_ms,
        };

        if self.enabled {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.ring.push_back(entry.clone());
            state.index_insert(&entry);
            state.evict_watermark(self.max_entries);
        }

        self.notify_subscribers(&entry);
        entry
    }

    fn notify_subscribers(&self, entry: &DebugTraceEntry) {
        let subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, subscriber) in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(entry))).is_err() {
                self.diagnostics.record(DiagnosticLevel::Warn, "trace_collector", "subscriber panicked");
            }
        }
    }

    /// Registers a subscriber, returning a handle usable with [`Self::unsubscribe`].
    pub fn subscribe(&self, subscriber: TraceSubscriber) -> u64 {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((id, subscriber));
        id
    }

    /// Removes a subscriber by handle.
    pub fn unsubscribe(&self, handle: u64) {
        self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).retain(|(id, _)| *id != handle);
    }

    /// Returns the number of entries currently held in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).ring.len()
    }

    /// Returns true if the ring holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every entry whose `correlationId` equals `correlation_id`.
    #[must_use]
    pub fn by_correlation(&self, correlation_id: &str) -> Vec<DebugTraceEntry> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .by_correlation
            .get(correlation_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.ring.iter().find(|e| &e.id == id).cloned())
            .collect()
    }

    /// Returns every entry whose `ruleId` equals `rule_id`.
    #[must_use]
    pub fn by_rule(&self, rule_id: &str) -> Vec<DebugTraceEntry> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .by_rule
            .get(rule_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.ring.iter().find(|e| &e.id == id).cloned())
            .collect()
    }

    /// Returns every entry of the given type.
    #[must_use]
    pub fn by_type(&self, entry_type: TraceEntryType) -> Vec<DebugTraceEntry> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .by_type
            .get(&entry_type)
            .into_iter()
            .flatten()
            .filter_map(|id| state.ring.iter().find(|e| &e.id == id).cloned())
            .collect()
    }

    /// Returns the most recent `count` entries, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<DebugTraceEntry> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let len = state.ring.len();
        state.ring.iter().skip(len.saturating_sub(count)).cloned().collect()
    }

    /// Discards every entry and index (does not affect subscribers).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *state = TraceState::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::interfaces::NullDiagnosticSink;
    use std::sync::atomic::AtomicUsize;

    fn collector(max_entries: usize) -> TraceCollector {
        TraceCollector::new(Arc::new(ManualClock::new(0)), true, max_entries, Arc::new(NullDiagnosticSink))
    }

    #[test]
    fn record_stamps_id_and_timestamp() {
        let collector = collector(10);
        let entry = collector.record(NewTraceEntry::new(TraceEntryType::RuleMatched));
        assert!(!entry.id.is_empty());
        assert_eq!(entry.timestamp, 0);
    }

    #[test]
    fn ring_bound_is_respected_under_load() {
        let collector = collector(10);
        for _ in 0..100 {
            collector.record(NewTraceEntry::new(TraceEntryType::ActionStarted));
        }
        assert!(collector.len() <= 10);
    }

    #[test]
    fn eviction_removes_from_every_index() {
        let collector = collector(10);
        for i in 0..20 {
            collector.record(
                NewTraceEntry::new(TraceEntryType::RuleMatched).with_rule(RuleId::new(format!("r{i}")), "name"),
            );
        }
        assert!(collector.by_rule("r0").is_empty());
        assert!(!collector.by_rule("r19").is_empty());
    }

    #[test]
    fn subscriber_panic_is_caught_and_swallowed() {
        let collector = collector(10);
        collector.subscribe(Box::new(|_| panic!("boom")));
        let entry = collector.record(NewTraceEntry::new(TraceEntryType::RuleMatched));
        assert!(!entry.id.is_empty());
    }

    #[test]
    fn correlation_index_finds_matching_entries() {
        let collector = collector(10);
        let correlation_id = CorrelationId::new("c1");
        collector.record(NewTraceEntry::new(TraceEntryType::EventEmitted).with_correlation(Some(correlation_id.clone())));
        collector.record(NewTraceEntry::new(TraceEntryType::ActionStarted).with_correlation(None));
        assert_eq!(collector.by_correlation("c1").len(), 1);
    }

    #[test]
    fn disabled_collector_does_not_grow_the_ring() {
        let collector = TraceCollector::new(Arc::new(ManualClock::new(0)), false, 10, Arc::new(NullDiagnosticSink));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        collector.subscribe(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        collector.record(NewTraceEntry::new(TraceEntryType::RuleMatched));
        assert_eq!(collector.len(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
