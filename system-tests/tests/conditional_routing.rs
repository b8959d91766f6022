// system-tests/tests/conditional_routing.rs
// ============================================================================
// Module: Conditional Routing Scenario
// Description: A `conditional` action branches on the triggering event's
//              payload and writes a different fact down each path.
// Dependencies: helpers, rules-core, rules-engine
// ============================================================================

mod helpers;

use rules_core::Comparator;
use rules_core::ConditionPredicate;
use rules_core::RuleAction;
use rules_core::Trigger;
use rules_logic::Requirement;
use serde_json::json;

#[tokio::test]
async fn routes_by_event_amount() {
    let engine = helpers::started_engine(0).await;

    let conditions = Requirement::predicate(ConditionPredicate::new(
        "event.amount",
        Comparator::GreaterThanOrEqual,
        Some(json!(100)),
    ));
    let rule = helpers::rule(
        "route-tier",
        Trigger::Event { topic: "order.paid".to_string() },
        vec![RuleAction::Conditional {
            conditions,
            then_actions: vec![RuleAction::SetFact { key: "tier".to_string(), value: json!("premium") }],
            else_actions: Some(vec![RuleAction::SetFact { key: "tier".to_string(), value: json!("basic") }]),
        }],
    );
    engine.register_rule(rule).unwrap();

    engine.emit("order.paid", json!({"amount": 200}), None).await.unwrap();
    assert_eq!(engine.get_fact("tier").map(|f| f.value), Some(json!("premium")));

    engine.emit("order.paid", json!({"amount": 10}), None).await.unwrap();
    assert_eq!(engine.get_fact("tier").map(|f| f.value), Some(json!("basic")));
}
