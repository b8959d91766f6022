// rules-engine/tests/sequence_scenario.rs
// ============================================================================
// Module: Sequence Pattern Integration Test
// Description: A two-step sequence pattern completes once both steps arrive
//              for the same `groupBy` key, within the window.
// ============================================================================

use std::sync::Arc;

use rules_core::Rule;
use rules_core::RuleAction;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_engine::EngineOptions;
use rules_engine::ManualClock;
use rules_engine::RuleEngine;
use rules_engine::temporal::EventMatcher;
use rules_engine::temporal::SequencePattern;
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
async fn steps_completing_in_order_trigger_the_bound_rule() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("shipment-sequence");
    engine
        .register_sequence_pattern(
            pattern_id.clone(),
            SequencePattern {
                steps: vec![EventMatcher::topic("order.packed"), EventMatcher::topic("order.shipped")],
                within_ms: 60_000,
                group_by: Some("orderId".to_string()),
                strict: true,
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-ship",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "shipped".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("order.packed", json!({"orderId": "o1"}), None).await.unwrap();
    assert!(engine.get_fact("shipped").is_none());

    engine.emit("order.shipped", json!({"orderId": "o1"}), None).await.unwrap();
    assert_eq!(engine.get_fact("shipped").unwrap().value, json!(true));
}

#[tokio::test]
async fn a_second_step_for_a_different_group_key_does_not_complete_the_first() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("shipment-sequence");
    engine
        .register_sequence_pattern(
            pattern_id.clone(),
            SequencePattern {
                steps: vec![EventMatcher::topic("order.packed"), EventMatcher::topic("order.shipped")],
                within_ms: 60_000,
                group_by: Some("orderId".to_string()),
                strict: true,
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-ship",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "shipped".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("order.packed", json!({"orderId": "o1"}), None).await.unwrap();
    engine.emit("order.shipped", json!({"orderId": "o2"}), None).await.unwrap();
    assert!(engine.get_fact("shipped").is_none());
}
