// rules-engine/tests/absence_scenario.rs
// ============================================================================
// Module: Absence Pattern Integration Test
// Description: An absence watch fires once its window elapses with no
//              matching "expected" event, and is cancelled if one arrives.
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use rules_core::Rule;
use rules_core::RuleAction;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_engine::EngineOptions;
use rules_engine::ManualClock;
use rules_engine::RuleEngine;
use rules_engine::temporal::AbsencePattern;
use rules_engine::temporal::EventMatcher;
use rules_logic::Requirement;
use serde_json::json;

const WITHIN_MS: u64 = 40;

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

async fn flush() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn missing_expected_event_fires_after_the_window() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("delivery-absence");
    engine
        .register_absence_pattern(
            pattern_id.clone(),
            AbsencePattern {
                after: EventMatcher::topic("shipment.dispatched"),
                expected: EventMatcher::topic("shipment.delivered"),
                within_ms: WITHIN_MS,
                group_by: Some("shipmentId".to_string()),
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-absence",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "delivery_overdue".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("shipment.dispatched", json!({"shipmentId": "s1"}), None).await.unwrap();
    tokio::time::advance(Duration::from_millis(WITHIN_MS + 10)).await;
    flush().await;

    assert_eq!(engine.get_fact("delivery_overdue").unwrap().value, json!(true));
}

#[tokio::test(start_paused = true)]
async fn expected_event_arriving_first_cancels_the_watch() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("delivery-absence");
    engine
        .register_absence_pattern(
            pattern_id.clone(),
            AbsencePattern {
                after: EventMatcher::topic("shipment.dispatched"),
                expected: EventMatcher::topic("shipment.delivered"),
                within_ms: WITHIN_MS,
                group_by: Some("shipmentId".to_string()),
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-absence",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "delivery_overdue".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("shipment.dispatched", json!({"shipmentId": "s1"}), None).await.unwrap();
    engine.emit("shipment.delivered", json!({"shipmentId": "s1"}), None).await.unwrap();
    tokio::time::advance(Duration::from_millis(WITHIN_MS + 10)).await;
    flush().await;

    assert!(engine.get_fact("delivery_overdue").is_none());
}
