// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared `RuleEngine` construction and rule-building shorthands.
// Purpose: Keep each scenario file focused on the behavior it exercises.
// ============================================================================

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use rules_core::Rule;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_engine::EngineOptions;
use rules_engine::ManualClock;
use rules_engine::RuleEngine;
use rules_logic::Requirement;

/// Builds and starts an engine with a manual clock pinned at `start_ms`.
pub async fn started_engine(start_ms: u64) -> RuleEngine {
    let options = EngineOptions { clock: Arc::new(ManualClock::new(start_ms)), ..EngineOptions::default() };
    let engine = RuleEngine::new(options);
    engine.start().await.unwrap();
    engine
}

/// Builds a rule with no conditions and the given trigger/actions. Every
/// other field is a placeholder the Rule Index overwrites on registration.
pub fn rule(id: &str, trigger: Trigger, actions: Vec<rules_core::RuleAction>) -> Rule {
    Rule {
        id: RuleId::new(id),
        name: id.to_string(),
        priority: 0,
        enabled: true,
        tags: BTreeSet::new(),
        group: None,
        trigger,
        requirements: Vec::new(),
        conditions: Requirement::and(vec![]),
        actions,
        version: 0,
        created_at: 0,
        updated_at: 0,
    }
}

/// Yields to the runtime a handful of times, letting timer-driven tasks
/// spawned by the engine (absence/count/aggregate window callbacks) run to
/// completion after a `tokio::time::advance`.
pub async fn flush() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
