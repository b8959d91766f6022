// rules-engine/tests/count_scenario.rs
// ============================================================================
// Module: Count Pattern Integration Test
// Description: A sliding count pattern matches once its threshold is
//              reached and on every qualifying event after that.
// ============================================================================

use std::sync::Arc;

use rules_core::Rule;
use rules_core::RuleAction;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_engine::EngineOptions;
use rules_engine::ManualClock;
use rules_engine::RuleEngine;
use rules_engine::temporal::Comparison;
use rules_engine::temporal::CountPattern;
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
async fn threshold_and_every_event_after_it_both_match() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("retry-count");
    engine
        .register_count_pattern(
            pattern_id.clone(),
            CountPattern {
                event: EventMatcher::topic("job.retried"),
                threshold: 2,
                comparison: Comparison::Gte,
                window_ms: 60_000,
                group_by: Some("jobId".to_string()),
                sliding: true,
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-count",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "retry_hits".to_string(), value: json!({"ref": "event.count"}) }],
        ))
        .unwrap();

    engine.emit("job.retried", json!({"jobId": "j1"}), None).await.unwrap();
    assert!(engine.get_fact("retry_hits").is_none());

    engine.emit("job.retried", json!({"jobId": "j1"}), None).await.unwrap();
    assert_eq!(engine.get_fact("retry_hits").unwrap().value, json!(2));

    engine.delete_fact("retry_hits").await.unwrap();
    engine.emit("job.retried", json!({"jobId": "j1"}), None).await.unwrap();
    assert_eq!(engine.get_fact("retry_hits").unwrap().value, json!(3));
}

#[tokio::test]
async fn counts_are_tracked_independently_per_group_key() {
    let engine = engine();
    let pattern_id = rules_core::PatternId::new("retry-count");
    engine
        .register_count_pattern(
            pattern_id.clone(),
            CountPattern {
                event: EventMatcher::topic("job.retried"),
                threshold: 2,
                comparison: Comparison::Gte,
                window_ms: 60_000,
                group_by: Some("jobId".to_string()),
                sliding: true,
            },
        )
        .unwrap();
    engine
        .register_rule(rule(
            "on-count",
            Trigger::Temporal { pattern: pattern_id },
            vec![RuleAction::SetFact { key: "retry_hits".to_string(), value: json!({"ref": "event.count"}) }],
        ))
        .unwrap();

    engine.emit("job.retried", json!({"jobId": "j1"}), None).await.unwrap();
    engine.emit("job.retried", json!({"jobId": "j2"}), None).await.unwrap();
    assert!(engine.get_fact("retry_hits").is_none());
}
