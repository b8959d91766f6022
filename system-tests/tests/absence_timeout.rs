// system-tests/tests/absence_timeout.rs
// ============================================================================
// Module: Absence Timeout Scenario
// Description: An `absence` pattern whose expected event never arrives fires
//              once its window elapses, routing into a temporal-bound rule.
// Dependencies: helpers, rules-core, rules-engine
// ============================================================================

mod helpers;

use std::time::Duration;

use rules_core::PatternId;
use rules_core::RuleAction;
use rules_core::Trigger;
use rules_engine::temporal::AbsencePattern;
use rules_engine::temporal::EventMatcher;
use serde_json::json;

const WITHIN_MS: u64 = 50;

#[tokio::test(start_paused = true)]
async fn fires_once_the_window_elapses_with_no_expected_event() {
    let engine = helpers::started_engine(0).await;

    let pattern_id = PatternId::new("payment-absence");
    engine
        .register_absence_pattern(
            pattern_id.clone(),
            AbsencePattern {
                after: EventMatcher::topic("order.created"),
                expected: EventMatcher::topic("payment.received"),
                within_ms: WITHIN_MS,
                group_by: Some("orderId".to_string()),
            },
        )
        .unwrap();

    engine
        .register_rule(helpers::rule(
            "on-absence",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "payment_overdue".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("order.created", json!({"orderId": "o1"}), None).await.unwrap();
    assert_eq!(engine.get_fact("payment_overdue"), None);

    tokio::time::advance(Duration::from_millis(WITHIN_MS + 10)).await;
    helpers::flush().await;

    assert_eq!(engine.get_fact("payment_overdue").map(|f| f.value), Some(json!(true)));
}

#[tokio::test(start_paused = true)]
async fn expected_event_within_the_window_cancels_the_watch() {
    let engine = helpers::started_engine(0).await;

    let pattern_id = PatternId::new("payment-absence");
    engine
        .register_absence_pattern(
            pattern_id.clone(),
            AbsencePattern {
                after: EventMatcher::topic("order.created"),
                expected: EventMatcher::topic("payment.received"),
                within_ms: WITHIN_MS,
                group_by: Some("orderId".to_string()),
            },
        )
        .unwrap();

    engine
        .register_rule(helpers::rule(
            "on-absence",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "payment_overdue".to_string(), value: json!(true) }],
        ))
        .unwrap();

    engine.emit("order.created", json!({"orderId": "o1"}), None).await.unwrap();
    engine.emit("payment.received", json!({"orderId": "o1"}), None).await.unwrap();

    tokio::time::advance(Duration::from_millis(WITHIN_MS + 10)).await;
    helpers::flush().await;

    assert_eq!(engine.get_fact("payment_overdue"), None);
}
