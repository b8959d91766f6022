// rules-core/src/action.rs
// ============================================================================
// Module: Rule Action Language
// Description: The recursively composable action variants the executor runs.
// Purpose: Define `RuleAction` and its nested specs (spec §3, §4.4).
// Dependencies: crate::condition::ConditionTree, serde_json::Value
// ============================================================================

//! ## Overview
//! An action list is a sequence of [`RuleAction`] values. Several variants
//! nest further action lists (`conditional`, `for_each`, `try_catch`), which
//! is why the Rule Index's reverse index must walk the tree recursively
//! (spec §4.2) rather than inspect only top-level actions.
//!
//! String fields (`key`, `topic`, `message`, `name`) may embed `${path}`
//! interpolation placeholders. `value`/`data`/`args` fields are plain
//! [`serde_json::Value`] trees; a literal `{"ref": "event.x"}` object is the
//! reference form described in spec §3 — it is recognised and resolved by
//! the Data Resolver/Action Executor, not by this data model.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Log Level
// ============================================================================

/// Severity level for a `log` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Fine-grained diagnostic detail.
    Debug,
    /// Routine informational message.
    Info,
    /// Recoverable but noteworthy condition.
    Warn,
    /// Error condition.
    Error,
}

// ============================================================================
// SECTION: Nested Specs
// ============================================================================

/// Specification for a `set_timer` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSpec {
    /// Timer name, matched by [`crate::trigger::Trigger::Timer`] on expiry.
    pub name: String,
    /// Duration string (`"5m"`, `"1500"`), parsed by `rules_logic::duration`.
    pub delay: String,
    /// Payload delivered alongside the timer's expiration stimulus.
    #[serde(default)]
    pub data: Value,
}

/// Specification for a `call_service` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallServiceSpec {
    /// Name of the registered service.
    pub service: String,
    /// Method to invoke on the service.
    pub method: String,
    /// Arguments, resolved recursively against the evaluation context.
    #[serde(default)]
    pub args: Value,
}

/// Specification for the `catch` clause of a `try_catch` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// Variable name the caught error is bound to, as `{message: string}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_var: Option<String>,
    /// Actions to run while the error binding is in scope.
    pub actions: Vec<RuleAction>,
}

// ============================================================================
// SECTION: RuleAction
// ============================================================================

/// A single action in a rule's action list.
///
/// `conditional`, `for_each`, and `try_catch` nest further action lists,
/// making the action language a small recursive interpreter rather than a
/// flat instruction sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Writes a fact.
    SetFact {
        /// Key, with `${path}` interpolation.
        key: String,
        /// Value, resolved recursively (may contain `{ref: ...}`).
        value: Value,
    },
    /// Deletes a fact.
    DeleteFact {
        /// Key, with `${path}` interpolation.
        key: String,
    },
    /// Emits a new event.
    EmitEvent {
        /// Topic, with `${path}` interpolation.
        topic: String,
        /// Payload, resolved recursively.
        #[serde(default)]
        data: Value,
    },
    /// Arms a timer.
    SetTimer {
        /// The timer specification.
        #[serde(flatten)]
        spec: TimerSpec,
    },
    /// Deregisters a timer.
    CancelTimer {
        /// Timer name, with `${path}` interpolation.
        name: String,
    },
    /// Invokes a registered service method.
    CallService {
        /// The service invocation specification.
        #[serde(flatten)]
        spec: CallServiceSpec,
    },
    /// Writes a message to the configured logger.
    Log {
        /// Severity level.
        level: LogLevel,
        /// Message, with `${path}` interpolation.
        message: String,
    },
    /// Branches on a condition tree.
    Conditional {
        /// Conditions to evaluate (AND-combined at the top level).
        conditions: crate::condition::ConditionTree,
        /// Actions to run when the conditions hold.
        #[serde(rename = "then")]
        then_actions: Vec<RuleAction>,
        /// Actions to run when the conditions do not hold.
        #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
        else_actions: Option<Vec<RuleAction>>,
    },
    /// Iterates over a resolved array.
    ForEach {
        /// Expression resolving to the collection to iterate (array value or `${path}`).
        collection: Value,
        /// Variable name each element is bound to, as `var.<as>`.
        #[serde(rename = "as")]
        as_var: String,
        /// Body executed once per element.
        actions: Vec<RuleAction>,
        /// Maximum number of iterations to run.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
    /// Runs a guarded action list with optional recovery and cleanup.
    TryCatch {
        /// Actions attempted in order; the first failure stops this list.
        #[serde(rename = "try")]
        try_actions: Vec<RuleAction>,
        /// Recovery clause run if a `try` action fails.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catch: Option<CatchClause>,
        /// Actions always run after `try`/`catch`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finally: Option<Vec<RuleAction>>,
    },
}

impl RuleAction {
    /// Visits every action in this list, including those nested inside
    /// `conditional`, `for_each`, and `try_catch` bodies.
    ///
    /// Used by the Rule Index to build its reverse action-key index
    /// (spec §4.2).
    pub fn walk_actions(actions: &[Self], visit: &mut impl FnMut(&Self)) {
        for action in actions {
            visit(action);
            match action {
                Self::Conditional { then_actions, else_actions, .. } => {
                    Self::walk_actions(then_actions, visit);
                    if let Some(else_actions) = else_actions {
                        Self::walk_actions(else_actions, visit);
                    }
                }
                Self::ForEach { actions, .. } => Self::walk_actions(actions, visit),
                Self::TryCatch { try_actions, catch, finally } => {
                    Self::walk_actions(try_actions, visit);
                    if let Some(catch) = catch {
                        Self::walk_actions(&catch.actions, visit);
                    }
                    if let Some(finally) = finally {
                        Self::walk_actions(finally, visit);
                    }
                }
                Self::SetFact { .. }
                | Self::DeleteFact { .. }
                | Self::EmitEvent { .. }
                | Self::SetTimer { .. }
                | Self::CancelTimer { .. }
                | Self::CallService { .. }
                | Self::Log { .. } => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_actions_visits_nested_conditional_branches() {
        let actions = vec![RuleAction::Conditional {
            conditions: rules_logic::Requirement::and(vec![]),
            then_actions: vec![RuleAction::SetFact {
                key: "tier".to_string(),
                value: Value::String("premium".to_string()),
            }],
            else_actions: Some(vec![RuleAction::SetFact {
                key: "tier".to_string(),
                value: Value::String("basic".to_string()),
            }]),
        }];

        let mut seen = 0;
        RuleAction::walk_actions(&actions, &mut |_| seen += 1);
        assert_eq!(seen, 3);
    }
}
