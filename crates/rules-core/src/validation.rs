// rules-core/src/validation.rs
// ============================================================================
// Module: Validation Errors
// Description: The `{path, message}` issue list reported by rule/group registration.
// Purpose: Give every caller of registration a single, structured failure shape.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Registration validates eagerly and fails with the complete list of issues
//! found, rather than stopping at the first one (spec §7: "fail immediately
//! with a list of `{path, message}` issues").

use thiserror::Error;

/// One field-level validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the offending field, e.g. `"trigger.pattern"`.
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl ValidationIssue {
    /// Builds a new validation issue.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// A registration failure carrying every issue found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed with {} issue(s)", .0.len())]
pub struct ValidationError(pub Vec<ValidationIssue>);

impl ValidationError {
    /// Builds a validation error from a single issue.
    #[must_use]
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![ValidationIssue::new(path, message)])
    }

    /// Returns true if no issues were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
