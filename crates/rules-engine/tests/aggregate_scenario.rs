// rules-engine/tests/aggregate_scenario.rs
// ============================================================================
// Module: Aggregate Pattern Integration Test
// Description: A sliding `sum` aggregate matches as soon as the running total
//              crosses its threshold.
// ============================================================================

use std::sync::Arc;

use rules_core::Rule;
use rules_core::RuleAction;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_engine::EngineOptions;
use rules_engine::ManualClock;
use rules_engine::RuleEngine;
use rules_engine::temporal::AggregateFunction;
use rules_engine::temporal::AggregatePattern;
use rules_engine::temporal::Comparison;
use rules_engine::temporal::EventMatcher;
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
async fn running_sum_matches_once_it_crosses_the_threshold() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("spend-aggregate");
    engine
        .register_aggregate_pattern(
            pattern_id.clone(),
            AggregatePattern {
                event: EventMatcher::topic("cart.charged"),
                field: "amount".to_string(),
                function: AggregateFunction::Sum,
                threshold: 100.0,
                comparison: Comparison::Gte,
                window_ms: 60_000,
                group_by: Some("customerId".to_string()),
                sliding: true,
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-spend",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "spend_flagged".to_string(), value: json!({"ref": "event.value"}) }],
        ))
        .unwrap();

    engine.emit("cart.charged", json!({"customerId": "c1", "amount": 40}), None).await.unwrap();
    assert!(engine.get_fact("spend_flagged").is_none());

    engine.emit("cart.charged", json!({"customerId": "c1", "amount": 70}), None).await.unwrap();
    assert_eq!(engine.get_fact("spend_flagged").unwrap().value, json!(110.0));
}

#[tokio::test]
async fn non_numeric_field_extraction_is_skipped_not_an_error() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("spend-aggregate");
    engine
        .register_aggregate_pattern(
            pattern_id.clone(),
            AggregatePattern {
                event: EventMatcher::topic("cart.charged"),
                field: "amount".to_string(),
                function: AggregateFunction::Sum,
                threshold: 100.0,
                comparison: Comparison::Gte,
                window_ms: 60_000,
                group_by: Some("customerId".to_string()),
                sliding: true,
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-spend",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "spend_flagged".to_string(), value: json!({"ref": "event.value"}) }],
        ))
        .unwrap();

    engine.emit("cart.charged", json!({"customerId": "c1", "amount": "not-a-number"}), None).await.unwrap();
    assert!(engine.get_fact("spend_flagged").is_none());
}
