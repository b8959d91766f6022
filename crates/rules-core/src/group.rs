// rules-core/src/group.rs
// ============================================================================
// Module: Group Data Model
// Description: The `Group` record gating rule activity.
// Purpose: Define the group lifecycle object described in spec §3.
// Dependencies: crate::identifiers::GroupId
// ============================================================================

//! ## Overview
//! A group is a client-managed container that gates the "active" state of
//! every rule that references it (spec §3: `active iff enabled ∧ (group==⊥ ∨
//! group.enabled)`). Groups carry no rule membership list of their own — the
//! Rule Index maintains a by-group secondary index over rules instead.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::GroupId;

/// A named container that gates the activity of the rules referencing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether rules in this group may be active.
    pub enabled: bool,
    /// Creation timestamp, monotonic milliseconds.
    pub created_at: u64,
    /// Last-update timestamp, monotonic milliseconds.
    pub updated_at: u64,
}

impl Group {
    /// Builds a freshly created, enabled group.
    #[must_use]
    pub fn new(id: GroupId, name: impl Into<String>, now: u64) -> Self {
        Self { id, name: name.into(), description: None, enabled: true, created_at: now, updated_at: now }
    }
}
