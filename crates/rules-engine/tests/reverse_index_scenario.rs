// rules-engine/tests/reverse_index_scenario.rs
// ============================================================================
// Module: Reverse Action Index Integration Test
// Description: `getByEventAction`/`getByFactAction` find rules by the action
//              keys/topics they write to, wildcards included, and both
//              indices are pruned on unregister.
// ============================================================================

use std::sync::Arc;

use rules_core::Rule;
use rules_core::RuleAction;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_engine::EngineOptions;
use rules_engine::ManualClock;
use rules_engine::RuleEngine;
use rules_logic::Requirement;
use serde_json::json;

fn engine() -> RuleEngine {
    let options = EngineOptions { clock: Arc::new(ManualClock::new(0)), ..EngineOptions::default() };
    RuleEngine::new(options)
}

fn rule(id: &str, trigger: Trigger, actions: Vec<RuleAction>) -> Rule {
    Rule {
        id: RuleId::new(id),
        name: id.to_string(),
        priority: 0,
        enabled: true,
        tags: Default::default(),
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

#[tokio::test]
async fn finds_rule_by_interpolated_emitted_topic() {
    let engine = engine();
    let r = rule(
        "notifier",
        Trigger::Event { topic: "order.paid".to_string() },
        vec![RuleAction::EmitEvent { topic: "notify.${event.channel}".to_string(), data: json!({}) }],
    );
    engine.register_rule(r).unwrap();

    let found = engine.get_by_event_action("notify.email");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, RuleId::new("notifier"));

    let unrelated = engine.get_by_event_action("order.paid");
    assert!(unrelated.is_empty());
}

#[tokio::test]
async fn unregistering_a_rule_removes_it_from_both_indices() {
    let engine = engine();
    let r = rule(
        "dual-writer",
        Trigger::Event { topic: "order.paid".to_string() },
        vec![
            RuleAction::SetFact { key: "order:${event.id}:status".to_string(), value: json!("paid") },
            RuleAction::EmitEvent { topic: "ledger.${event.id}".to_string(), data: json!({}) },
        ],
    );
    engine.register_rule(r).unwrap();

    assert_eq!(engine.get_by_fact_action("order:1:status").len(), 1);
    assert_eq!(engine.get_by_event_action("ledger.1").len(), 1);

    engine.unregister_rule(&RuleId::new("dual-writer")).unwrap();

    assert!(engine.get_by_fact_action("order:1:status").is_empty());
    assert!(engine.get_by_event_action("ledger.1").is_empty());
}
