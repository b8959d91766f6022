// system-tests/tests/sequence_match.rs
// ============================================================================
// Module: Sequence Match Scenario
// Description: `sequence [order.created, payment.received]` completing within
//              its window routes into a rule bound to the temporal pattern.
// Dependencies: helpers, rules-core, rules-engine
// ============================================================================

mod helpers;

use rules_core::PatternId;
use rules_core::RuleAction;
use rules_core::Trigger;
use rules_engine::temporal::EventMatcher;
use rules_engine::temporal::SequencePattern;
use serde_json::json;

#[tokio::test]
async fn completes_within_window_and_routes_to_temporal_rule() {
    let engine = helpers::started_engine(0).await;

    let pattern_id = PatternId::new("order-paid-sequence");
    engine
        .register_sequence_pattern(
            pattern_id.clone(),
            SequencePattern {
                steps: vec![EventMatcher::topic("order.created"), EventMatcher::topic("payment.received")],
                within_ms: 5 * 60 * 1000,
                group_by: Some("orderId".to_string()),
                strict: false,
            },
        )
        .unwrap();

    engine
        .register_rule(helpers::rule(
            "on-sequence",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "sequence_seen".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("order.created", json!({"orderId": "o1"}), None).await.unwrap();
    engine.emit("payment.received", json!({"orderId": "o1"}), None).await.unwrap();

    assert_eq!(engine.get_fact("sequence_seen").map(|f| f.value), Some(json!(true)));

    // A fresh occurrence of the full sequence produces another independent match.
    engine.delete_fact("sequence_seen").await.unwrap();
    engine.emit("order.created", json!({"orderId": "o2"}), None).await.unwrap();
    engine.emit("payment.received", json!({"orderId": "o2"}), None).await.unwrap();
    assert_eq!(engine.get_fact("sequence_seen").map(|f| f.value), Some(json!(true)));
}

#[tokio::test]
async fn out_of_order_second_event_does_not_complete_a_different_group() {
    let engine = helpers::started_engine(0).await;

    let pattern_id = PatternId::new("order-paid-sequence");
    engine
        .register_sequence_pattern(
            pattern_id.clone(),
            SequencePattern {
                steps: vec![EventMatcher::topic("order.created"), EventMatcher::topic("payment.received")],
                within_ms: 5 * 60 * 1000,
                group_by: Some("orderId".to_string()),
                strict: false,
            },
        )
        .unwrap();

    engine
        .register_rule(helpers::rule(
            "on-sequence",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "sequence_seen".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("order.created", json!({"orderId": "o1"}), None).await.unwrap();
    // Payment for an unrelated order must not complete o1's instance.
    engine.emit("payment.received", json!({"orderId": "o2"}), None).await.unwrap();
    assert_eq!(engine.get_fact("sequence_seen"), None);
}
