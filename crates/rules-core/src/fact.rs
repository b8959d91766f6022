// rules-core/src/fact.rs
// ============================================================================
// Module: Fact Data Model
// Description: The `Fact` record and its change-notification shape.
// Purpose: Define the unit of keyed, versioned state the Fact Store manages.
// Dependencies: serde_json::Value
// ============================================================================

//! ## Overview
//! A fact is a single keyed value with a monotonically increasing version
//! (spec §3). Keys are colon-segmented (`customer:123:age`); the segment
//! grammar itself lives in `rules_logic::pattern`, not here.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Fact
// ============================================================================

/// A single keyed, versioned piece of engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Colon-segmented key, e.g. `customer:123:age`.
    pub key: String,
    /// The fact's current value.
    pub value: Value,
    /// Monotonic milliseconds timestamp of the last write.
    pub timestamp: u64,
    /// Who wrote this fact (`"system"`, `"rule"`, or a caller-supplied tag).
    pub source: String,
    /// Version, starting at 1 on first write and incrementing by one per write.
    pub version: u32,
}

impl Fact {
    /// Builds the first version of a fact.
    #[must_use]
    pub fn first(key: impl Into<String>, value: Value, source: impl Into<String>, timestamp: u64) -> Self {
        Self { key: key.into(), value, timestamp, source: source.into(), version: 1 }
    }

    /// Builds the next version of this fact with a new value.
    #[must_use]
    pub fn next_version(&self, value: Value, source: impl Into<String>, timestamp: u64) -> Self {
        Self {
            key: self.key.clone(),
            value,
            timestamp,
            source: source.into(),
            version: self.version.saturating_add(1),
        }
    }
}

// ============================================================================
// SECTION: Change Notification
// ============================================================================

/// The kind of mutation that produced a [`FactChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactChangeKind {
    /// The key had no prior value.
    Created,
    /// The key had a prior value that was replaced.
    Updated,
    /// The key was removed.
    Deleted,
}

/// A single fact mutation, delivered to the Fact Store's change listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactChange {
    /// What kind of mutation occurred.
    pub kind: FactChangeKind,
    /// The key that changed.
    pub key: String,
    /// The fact's state after the mutation (`None` only for `Deleted`).
    pub current: Option<Fact>,
    /// The fact's state before the mutation, when one existed.
    pub previous: Option<Fact>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_version_increments_and_preserves_key() {
        let first = Fact::first("customer:1:age", json!(30), "system", 0);
        let second = first.next_version(json!(31), "rule", 10);
        assert_eq!(second.version, 2);
        assert_eq!(second.key, first.key);
    }
}
