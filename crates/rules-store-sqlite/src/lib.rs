// rules-store-sqlite/src/lib.rs
// ============================================================================
// Module: Rules SQLite Store Root
// Description: Public API surface for the SQLite-backed RulePersistence adapter.
// Purpose: Re-export the store type and its error for downstream crates.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! `rules-store-sqlite` is the concrete persistence adapter named in spec §6
//! as an external collaborator: it implements `rules_engine::RulePersistence`
//! over a `SQLite` file, storing the complete rule and group sets the way
//! `restore` expects to receive them back.

pub mod store;

pub use store::SqliteRulePersistence;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
