// rules-engine/src/fact_store.rs
// ============================================================================
// Module: Fact Store
// Description: Keyed, versioned fact storage with prefix-indexed wildcard
//              query and synchronous change notification.
// Purpose: Implement spec §4.1 in full: O(1) point access, O(k) prefix-gated
//          wildcard query, and a single optional change listener.
// Dependencies: crate::clock::SharedClock, crate::interfaces::DiagnosticSink,
//               rules_core::{Fact, FactChange, FactChangeKind}, rules_logic::pattern
// ============================================================================

//! ## Overview
//! The Fact Store is the engine's only mutable shared state besides the Rule
//! Index and temporal matchers. It guarantees a single authoritative value
//! per key (spec §3(b)) and keeps a secondary prefix index in lock-step with
//! the primary map so wildcard queries never scan the whole store unless the
//! pattern itself demands it (spec §4.1).

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;

use rules_core::Fact;
use rules_core::FactChange;
use rules_core::FactChangeKind;
use rules_logic::Separator;
use rules_logic::matches_pattern;

use crate::clock::SharedClock;
use crate::interfaces::DiagnosticLevel;
use crate::interfaces::DiagnosticSink;

/// A single-slot change listener.
///
/// The Fact Store supports exactly one listener at a time (spec §4.1); the
/// orchestrator is responsible for fanning a single call out to multiple
/// interested parties if needed.
pub type ChangeListener = Box<dyn Fn(&FactChange) + Send + Sync>;

struct FactStoreState {
    facts: BTreeMap<String, Fact>,
    prefix_index: HashMap<String, HashSet<String>>,
}

impl FactStoreState {
    fn new() -> Self {
        Self { facts: BTreeMap::new(), prefix_index: HashMap::new() }
    }

    fn first_segment(key: &str) -> &str {
        key.split(':').next().unwrap_or(key)
    }

    fn index_insert(&mut self, key: &str) {
        self.prefix_index.entry(Self::first_segment(key).to_string()).or_default().insert(key.to_string());
    }

    fn index_remove(&mut self, key: &str) {
        if let Some(bucket) = self.prefix_index.get_mut(Self::first_segment(key)) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.prefix_index.remove(Self::first_segment(key));
            }
        }
    }
}

/// Keyed, versioned fact storage with wildcard query and change notification.
pub struct FactStore {
    name: String,
    state: Mutex<FactStoreState>,
    listener: Mutex<Option<ChangeListener>>,
    clock: SharedClock,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl FactStore {
    /// Builds a new, empty fact store.
    #[must_use]
    pub fn new(name: impl Into<String>, clock: SharedClock, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self { name: name.into(), state: Mutex::new(FactStoreState::new()), listener: Mutex::new(None), clock, diagnostics }
    }

    /// Registers the store's single change listener, replacing any prior one.
    pub fn set_listener(&self, listener: ChangeListener) {
        *self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(listener);
    }

    /// Removes the store's change listener, if one is set.
    pub fn clear_listener(&self) {
        *self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    fn notify(&self, change: &FactChange) {
        let guard = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(listener) = guard.as_ref() else { return };
        // Spec §4.1 / §7: listener exceptions are caught, logged with the
        // store's name, and must never affect the mutation's return value.
        if catch_unwind(AssertUnwindSafe(|| listener(change))).is_err() {
            self.diagnostics.record(
                DiagnosticLevel::Warn,
                "fact_store",
                &format!("change listener for store \"{}\" panicked", self.name),
            );
        }
    }

    /// Writes `key`, returning the resulting fact.
    ///
    /// Emits `created` on first write, `updated` (with the previous value)
    /// otherwise.
    pub fn set(&self, key: impl Into<String>, value: Value, source: &str) -> Fact {
        let key = key.into();
        let now = self.clock.now_ms();
        let (fact, previous, kind) = {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let previous = state.facts.get(&key).cloned();
            let fact = match &previous {
                Some(prev) => prev.next_version(value, source, now),
                None => Fact::first(key.clone(), value, source, now),
            };
            let kind = if previous.is_some() { FactChangeKind::Updated } else { FactChangeKind::Created };
            state.index_insert(&key);
            state.facts.insert(key.clone(), fact.clone());
            (fact, previous, kind)
        };

        self.notify(&FactChange { kind, key, current: Some(fact.clone()), previous });
        fact
    }

    /// Returns the current fact for `key`, if one exists.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Fact> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).facts.get(key).cloned()
    }

    /// Deletes `key`, returning true if a fact was actually removed.
    ///
    /// Emits `deleted` only when the return value is true.
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let removed = state.facts.remove(key);
            if removed.is_some() {
                state.index_remove(key);
            }
            removed
        };

        let Some(previous) = removed else { return false };
        self.notify(&FactChange {
            kind: FactChangeKind::Deleted,
            key: key.to_string(),
            current: None,
            previous: Some(previous),
        });
        true
    }

    /// Returns every fact whose key matches `pattern` (spec §4.1 three-path query).
    #[must_use]
    pub fn query(&self, pattern: &str) -> Vec<Fact> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if !pattern.contains('*') {
            return state.facts.get(pattern).cloned().into_iter().collect();
        }

        let first = FactStoreState::first_segment(pattern);
        if first == "*" {
            return state
                .facts
                .iter()
                .filter(|(key, _)| matches_pattern(pattern, key, Separator::Colon))
                .map(|(_, fact)| fact.clone())
                .collect();
        }

        let Some(bucket) = state.prefix_index.get(first) else { return Vec::new() };
        bucket
            .iter()
            .filter_map(|key| state.facts.get(key))
            .filter(|fact| matches_pattern(pattern, &fact.key, Separator::Colon))
            .cloned()
            .collect()
    }

    /// Returns every fact satisfying `predicate`.
    pub fn filter(&self, mut predicate: impl FnMut(&Fact) -> bool) -> Vec<Fact> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .facts
            .values()
            .filter(|fact| predicate(fact))
            .cloned()
            .collect()
    }

    /// Returns every fact currently stored.
    #[must_use]
    pub fn get_all(&self) -> Vec<Fact> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).facts.values().cloned().collect()
    }

    /// Returns the number of facts currently stored.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).facts.len()
    }

    /// Removes every fact without emitting change notifications.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.facts.clear();
        state.prefix_index.clear();
    }

    /// Returns the store's configured name, used in diagnostic messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::interfaces::NullDiagnosticSink;
    use serde_json::json;

    fn store() -> FactStore {
        FactStore::new("test", Arc::new(ManualClock::new(0)), Arc::new(NullDiagnosticSink))
    }

    #[test]
    fn set_assigns_version_one_on_first_write() {
        let store = store();
        let fact = store.set("customer:1:age", json!(30), "system");
        assert_eq!(fact.version, 1);
    }

    #[test]
    fn set_increments_version_on_each_subsequent_write() {
        let store = store();
        store.set("k", json!(1), "system");
        let second = store.set("k", json!(2), "system");
        assert_eq!(second.version, 2);
    }

    #[test]
    fn delete_then_set_resets_version_to_one() {
        let store = store();
        store.set("k", json!(1), "system");
        assert!(store.delete("k"));
        let fact = store.set("k", json!(2), "system");
        assert_eq!(fact.version, 1);
    }

    #[test]
    fn delete_returns_false_when_key_absent() {
        let store = store();
        assert!(!store.delete("missing"));
    }

    #[test]
    fn query_exact_pattern_is_direct_get() {
        let store = store();
        store.set("customer:1:age", json!(30), "system");
        let results = store.query("customer:1:age");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn query_wildcard_uses_prefix_bucket() {
        let store = store();
        store.set("customer:1:age", json!(30), "system");
        store.set("customer:2:age", json!(40), "system");
        store.set("order:1:total", json!(9), "system");
        let mut results: Vec<_> = store.query("customer:*:age").into_iter().map(|f| f.key).collect();
        results.sort();
        assert_eq!(results, vec!["customer:1:age", "customer:2:age"]);
    }

    #[test]
    fn query_leading_wildcard_scans_everything() {
        let store = store();
        store.set("customer:1:age", json!(30), "system");
        store.set("order:1:age", json!(1), "system");
        let results = store.query("*:1:age");
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn notify_reports_created_and_updated() {
        let store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store.set_listener(Box::new(move |change| {
            seen_clone.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(change.kind);
        }));
        store.set("k", json!(1), "system");
        store.set("k", json!(2), "system");
        store.delete("k");
        let kinds = seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        assert_eq!(
            kinds,
            vec![FactChangeKind::Created, FactChangeKind::Updated, FactChangeKind::Deleted]
        );
    }

    #[test]
    fn listener_panic_does_not_prevent_mutation() {
        let store = store();
        store.set_listener(Box::new(|_| panic!("boom")));
        let fact = store.set("k", json!(1), "system");
        assert_eq!(fact.version, 1);
        assert_eq!(store.get("k"), Some(fact));
    }
}
