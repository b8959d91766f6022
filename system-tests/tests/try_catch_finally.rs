// system-tests/tests/try_catch_finally.rs
// ============================================================================
// Module: Try/Catch/Finally Scenario
// Description: A failing service call is caught, binds its error message into
//              a fact, and the `finally` clause still runs.
// Dependencies: helpers, rules-core, rules-engine
// ============================================================================

mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use rules_core::CallServiceSpec;
use rules_core::CatchClause;
use rules_core::RuleAction;
use rules_core::Trigger;
use rules_engine::Service;
use rules_engine::interfaces::ServiceError;
use serde_json::Value;
use serde_json::json;

struct FailingService;

#[async_trait]
impl Service for FailingService {
    async fn call(&self, _method: &str, _args: Value) -> Result<Value, ServiceError> {
        Err(ServiceError::Invocation("boom".to_string()))
    }
}

#[tokio::test]
async fn binds_error_message_and_still_runs_finally() {
    let engine = helpers::started_engine(0).await;
    engine.register_service("svc", Arc::new(FailingService));

    let rule = helpers::rule(
        "guarded-call",
        Trigger::Event { topic: "order.paid".to_string() },
        vec![RuleAction::TryCatch {
            try_actions: vec![RuleAction::CallService {
                spec: CallServiceSpec { service: "svc".to_string(), method: "fail".to_string(), args: json!({}) },
            }],
            catch: Some(CatchClause {
                as_var: Some("err".to_string()),
                actions: vec![RuleAction::SetFact {
                    key: "err_msg".to_string(),
                    value: json!({"ref": "var.err.message"}),
                }],
            }),
            finally: Some(vec![RuleAction::SetFact { key: "cleaned".to_string(), value: json!(true) }]),
        }],
    );
    engine.register_rule(rule).unwrap();

    engine.emit("order.paid", json!({}), None).await.unwrap();

    assert_eq!(engine.get_fact("err_msg").map(|f| f.value), Some(json!("boom")));
    assert_eq!(engine.get_fact("cleaned").map(|f| f.value), Some(json!(true)));
}
