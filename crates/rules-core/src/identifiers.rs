// rules-core/src/identifiers.rs
// ============================================================================
// Module: Core Identifiers
// Description: Opaque, string-backed identifiers for rules, groups, and events.
// Purpose: Give each identifier its own type so a `GroupId` can never be
//          passed where a `RuleId` is expected.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers in this system are caller-supplied or engine-generated opaque
//! strings (spec §3: `id`, `unique-string`). Validation beyond non-emptiness
//! is left to the caller; these wrappers exist for type safety and stable
//! serialization, not for format enforcement.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(RuleId, "Identifier for a registered rule.");
string_id!(GroupId, "Identifier for a rule group.");
string_id!(EventId, "Identifier for an in-flight event.");
string_id!(CorrelationId, "Caller-supplied identifier grouping causally related work.");
string_id!(PatternId, "Identifier for a registered temporal pattern.");
string_id!(TemporalInstanceId, "Identifier for one in-flight temporal pattern instance.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_as_str() {
        let id = RuleId::new("order-tier-rule");
        assert_eq!(id.as_str(), "order-tier-rule");
        assert_eq!(id.to_string(), "order-tier-rule");
    }

    #[test]
    fn distinct_id_types_do_not_unify() {
        let rule_id = RuleId::new("r1");
        let group_id = GroupId::new("r1");
        assert_eq!(rule_id.as_str(), group_id.as_str());
    }
}
