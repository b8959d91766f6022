// rules-config/src/lib.rs
// ============================================================================
// Module: Rules Config Root
// Description: Public API surface for loading and validating engine config.
// Purpose: Turn a TOML document into an `EngineConfig`, failing closed on
//          malformed or oversized input.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! `rules-config` loads the options enumerated for engine construction: the
//! Fact Store name, persistence adapter selection, audit flush interval,
//! trace collector limits, and the service registry's entries. It never
//! constructs the engine itself — `rules-cli` and any other embedder read
//! an `EngineConfig` and pass its fields into `rules_engine::EngineOptions`.

pub mod config;

pub use config::ConfigError;
pub use config::ConfigIssue;
pub use config::EngineConfig;
