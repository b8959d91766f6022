// rules-core/src/lookup.rs
// ============================================================================
// Module: Lookup Requirement
// Description: A rule's declared Data Resolver requirement.
// Purpose: Define the `{name, service, method, args, cache?, onError}` shape
//          `resolveAll` consumes (spec §4.5).
// Dependencies: serde_json::Value
// ============================================================================

//! ## Overview
//! A rule may declare zero or more lookup requirements; the orchestrator
//! resolves all of them in parallel before evaluating the rule's conditions,
//! making the results addressable as `lookup.<name>` in the evaluation
//! context (spec §4.4, §4.5).

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// What to do when a requirement fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Record the error and skip the rule entirely.
    Skip,
    /// Abort `resolveAll` with a resolution error.
    Fail,
}

impl Default for OnError {
    fn default() -> Self {
        Self::Skip
    }
}

/// Caching policy for a lookup requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Time-to-live, in milliseconds, a cached result remains valid for.
    pub ttl_ms: u64,
}

/// One declared Data Resolver requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequirement {
    /// Name this requirement's result is addressable under (`lookup.<name>`).
    pub name: String,
    /// Registered service to invoke.
    pub service: String,
    /// Method to invoke on that service.
    pub method: String,
    /// Arguments, resolved against the evaluation context before invocation.
    #[serde(default)]
    pub args: Value,
    /// Caching policy; `None` means never cache this requirement's result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSpec>,
    /// Failure policy.
    #[serde(default)]
    pub on_error: OnError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_error_defaults_to_skip() {
        assert_eq!(OnError::default(), OnError::Skip);
    }
}
