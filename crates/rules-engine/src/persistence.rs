// rules-engine/src/persistence.rs
// ============================================================================
// Module: In-Memory Persistence
// Description: A `RulePersistence` adapter backed by a process-local mutex,
//              used as the engine's default and in every engine-level test.
// Purpose: Give the orchestrator a working persistence adapter with no
//          external dependency, mirroring the teacher's in-memory run-state
//          store used ahead of (and alongside) its SQLite-backed one.
// Dependencies: crate::interfaces::{RulePersistence, PersistenceError}
// ============================================================================

//! ## Overview
//! [`InMemoryPersistence`] round-trips whatever was last saved; it never
//! fails, so it is a reasonable default for embedders that have not wired in
//! `rules-store-sqlite` or their own adapter. Durable persistence across
//! process restarts is `rules-store-sqlite`'s job, not this module's.

use std::sync::Mutex;

use async_trait::async_trait;

use rules_core::Group;
use rules_core::Rule;

use crate::interfaces::PersistenceError;
use crate::interfaces::RulePersistence;

#[derive(Default)]
struct Snapshot {
    rules: Vec<Rule>,
    groups: Vec<Group>,
}

/// A `RulePersistence` adapter that keeps its last-saved state in memory.
pub struct InMemoryPersistence {
    snapshot: Mutex<Snapshot>,
}

impl InMemoryPersistence {
    /// Builds an adapter with no rules or groups saved yet.
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot: Mutex::new(Snapshot::default()) }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RulePersistence for InMemoryPersistence {
    async fn load(&self) -> Result<(Vec<Rule>, Vec<Group>), PersistenceError> {
        let snapshot = self.snapshot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok((snapshot.rules.clone(), snapshot.groups.clone()))
    }

    async fn save(&self, rules: &[Rule], groups: &[Group]) -> Result<(), PersistenceError> {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        snapshot.rules = rules.to_vec();
        snapshot.groups = groups.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules_core::ConditionTree;
    use std::collections::BTreeSet;

    fn sample_rule() -> Rule {
        Rule {
            id: rules_core::RuleId::new("r1"),
            name: "sample".to_string(),
            priority: 0,
            enabled: true,
            tags: BTreeSet::new(),
            group: None,
            trigger: rules_core::Trigger::Event { topic: "order.paid".to_string() },
            requirements: vec![],
            conditions: ConditionTree::and(vec![]),
            actions: vec![],
            version: 1,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn round_trips_saved_state() {
        let persistence = InMemoryPersistence::new();
        persistence.save(&[sample_rule()], &[]).await.unwrap();
        let (rules, groups) = persistence.load().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn load_before_any_save_returns_empty_state() {
        let persistence = InMemoryPersistence::new();
        let (rules, groups) = persistence.load().await.unwrap();
        assert!(rules.is_empty());
        assert!(groups.is_empty());
    }
}
