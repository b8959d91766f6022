// rules-config/src/config.rs
// ============================================================================
// Module: Engine Configuration
// Description: TOML-backed configuration for constructing a `RuleEngine`.
// Purpose: Fail-closed loading of the options spec §6 enumerates: engine
//          name, persistence adapter, audit flush interval, trace limits,
//          fact store name, and the service registry.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with a hard size guard and a
//! `RULEFORGE_CONFIG` environment override, mirroring a teacher config
//! crate's `resolve_path`/`validate_path`/`load` sequence. A malformed or
//! oversized file fails closed rather than falling back to defaults.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "ruleforge.toml";
/// Environment variable used to override the config path.
const CONFIG_ENV_VAR: &str = "RULEFORGE_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length accepted for a config path.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default trace collector ring capacity (spec §6: `maxEntries? = 10000`).
const DEFAULT_TRACE_MAX_ENTRIES: usize = 10_000;

/// One configuration validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    /// Dotted path to the offending field, e.g. `"trace.maxEntries"`.
    pub path: String,
    /// Human-readable description of what is wrong.
    pub message: String,
}

impl ConfigIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// Errors surfaced while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file is not valid TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The config file exceeds [`MAX_CONFIG_FILE_SIZE`] or its path is malformed.
    #[error("invalid config path: {0}")]
    InvalidPath(String),
    /// The parsed document failed semantic validation.
    #[error("config validation failed: {0:?}")]
    Invalid(Vec<ConfigIssue>),
}

/// Selects which `RulePersistence` adapter the embedder wires in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "adapter")]
pub enum PersistenceConfig {
    /// No persistence; rules and groups live only in memory.
    #[default]
    Memory,
    /// `rules-store-sqlite`'s adapter, backed by a file at `path`.
    Sqlite {
        /// Filesystem path to the SQLite database.
        path: String,
    },
}

/// Audit sink selection and flush cadence (spec §6: `audit?: {adapter, flushIntervalMs}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Name of the audit back-end to wire in; `"noop"` if absent.
    #[serde(default = "default_audit_adapter")]
    pub adapter: String,
    /// How often the adapter is expected to flush, in milliseconds.
    #[serde(default = "default_flush_interval_ms", rename = "flushIntervalMs")]
    pub flush_interval_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { adapter: default_audit_adapter(), flush_interval_ms: default_flush_interval_ms() }
    }
}

fn default_audit_adapter() -> String {
    "noop".to_string()
}

const fn default_flush_interval_ms() -> u64 {
    5_000
}

/// Baseline statistics provider selection (spec §6: `baseline?: {...}`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BaselineConfig {
    /// Name of the baseline provider to wire in; `"noop"` if absent.
    #[serde(default = "default_baseline_adapter")]
    pub adapter: String,
}

fn default_baseline_adapter() -> String {
    "noop".to_string()
}

/// Fact Store options (spec §6: `{name?, onFactChange?: listener}`).
///
/// `onFactChange` is a runtime callback, not a serializable value, so only
/// the store's display name is configured here; the listener itself is
/// supplied through `rules_engine::EngineOptions::on_fact_change`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FactStoreConfig {
    /// Display name for the Fact Store.
    pub name: Option<String>,
}

/// Trace Collector options (spec §6: `{enabled?: bool = false, maxEntries?: int = 10000}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraceConfig {
    /// Whether the Trace Collector records entries at all.
    #[serde(default)]
    pub enabled: bool,
    /// Ring buffer capacity before the oldest ~10% are evicted.
    #[serde(default = "default_trace_max_entries", rename = "maxEntries")]
    pub max_entries: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { enabled: false, max_entries: default_trace_max_entries() }
    }
}

const fn default_trace_max_entries() -> usize {
    DEFAULT_TRACE_MAX_ENTRIES
}

/// One registered service entry (spec §6: `services?: map`).
///
/// `rules-config` only describes *which* services to wire and where they
/// point; the actual `Service` trait object is constructed by the embedder
/// since it may need credentials or connections this crate has no business
/// holding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Backend kind, e.g. `"http"`, `"grpc"`, `"in_process"`.
    pub kind: String,
    /// Backend-specific connection target (URL, socket path, ...).
    pub target: Option<String>,
}

/// Complete engine configuration, loaded from a TOML document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Display name for the engine's Fact Store (spec §6: `name?`).
    pub name: Option<String>,
    /// Persistence adapter selection.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Audit sink selection and flush cadence.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Baseline provider selection.
    #[serde(default)]
    pub baseline: BaselineConfig,
    /// Registered service entries, keyed by service name.
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    /// Fact Store options.
    #[serde(default, rename = "factStore")]
    pub fact_store: FactStoreConfig,
    /// Trace Collector options.
    #[serde(default)]
    pub trace: TraceConfig,
}

impl EngineConfig {
    /// Loads and validates configuration from `path`, or from the
    /// `RULEFORGE_CONFIG` environment variable, or from `ruleforge.toml` in
    /// the current directory if neither is given.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, exceeds the size
    /// guard, is not valid TOML, or fails [`Self::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::InvalidPath("config file exceeds size limit".to_string()));
        }
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::InvalidPath("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field-level constraints that serde's defaults can't express.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] with every issue found, not just the
    /// first (spec §7: "fail immediately with a list of `{path, message}` issues").
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if let PersistenceConfig::Sqlite { path } = &self.persistence {
            if path.trim().is_empty() {
                issues.push(ConfigIssue::new("persistence.path", "sqlite persistence requires a non-empty path"));
            }
        }
        if self.audit.flush_interval_ms == 0 {
            issues.push(ConfigIssue::new("audit.flushIntervalMs", "must be greater than zero"));
        }
        if self.trace.max_entries == 0 {
            issues.push(ConfigIssue::new("trace.maxEntries", "must be greater than zero"));
        }
        for (name, service) in &self.services {
            if service.kind.trim().is_empty() {
                issues.push(ConfigIssue::new(format!("services.{name}.kind"), "must be non-empty"));
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(issues)) }
    }
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::InvalidPath("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::InvalidPath("config path exceeds max length".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_when_sections_absent() {
        let file = write_config("name = \"demo\"\n");
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.name.as_deref(), Some("demo"));
        assert_eq!(config.persistence, PersistenceConfig::Memory);
        assert!(!config.trace.enabled);
        assert_eq!(config.trace.max_entries, DEFAULT_TRACE_MAX_ENTRIES);
    }

    #[test]
    fn sqlite_persistence_requires_path() {
        let file = write_config("[persistence]\nadapter = \"sqlite\"\npath = \"\"\n");
        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        match err {
            ConfigError::Invalid(issues) => {
                assert!(issues.iter().any(|issue| issue.path == "persistence.path"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_flush_interval() {
        let file = write_config("[audit]\nflushIntervalMs = 0\n");
        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/ruleforge.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
