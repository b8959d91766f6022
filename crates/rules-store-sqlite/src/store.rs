// rules-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Rule Persistence
// Description: Durable RulePersistence backed by SQLite.
// Purpose: Persist the complete rule and group sets as canonical JSON rows,
//          restoring them unchanged on load (spec §6 "Persisted layout").
// Dependencies: rules-core, rules-engine, rusqlite, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! Each `save` overwrites the `rules` and `groups` tables inside one
//! transaction; each row holds one record serialized as JSON. `load` reads
//! both tables back and deserializes every row, matching
//! `RulePersistence::load`'s "complete rule and group sets" contract.
//! Security posture: the database file is a local artifact; a corrupted
//! row fails the load rather than silently dropping data.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;

use rules_core::Group;
use rules_core::Rule;
use rules_engine::interfaces::PersistenceError;
use rules_engine::interfaces::RulePersistence;

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Errors produced by the `SQLite` adapter itself, before they are wrapped
/// into [`PersistenceError`] at the `RulePersistence` boundary.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The database file or its parent directory could not be accessed.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// The path failed a safety check before the file was opened.
    #[error("invalid store path: {0}")]
    Invalid(String),
    /// `SQLite` itself reported a failure.
    #[error("sqlite error: {0}")]
    Db(String),
    /// A stored row's JSON payload could not be decoded.
    #[error("corrupt row: {0}")]
    Decode(String),
}

impl From<SqliteStoreError> for PersistenceError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Decode(message) => PersistenceError::Decode(message),
            other => PersistenceError::Io(other.to_string()),
        }
    }
}

/// Configuration for opening a [`SqliteRulePersistence`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Filesystem path to the database file.
    pub path: PathBuf,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// `SQLite`-backed [`RulePersistence`] adapter.
pub struct SqliteRulePersistence {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRulePersistence {
    /// Opens (creating if absent) a `SQLite`-backed rule store at `config.path`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the path fails validation, its parent
    /// directory cannot be created, or the database cannot be opened or
    /// migrated.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config.path)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    fn load_sync(&self) -> Result<(Vec<Rule>, Vec<Group>), SqliteStoreError> {
        let connection = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut rule_stmt = connection
            .prepare("SELECT payload FROM rules ORDER BY id")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rules = rule_stmt
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            .map(|payload| {
                let payload = payload.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                serde_json::from_str::<Rule>(&payload).map_err(|err| SqliteStoreError::Decode(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut group_stmt = connection
            .prepare("SELECT payload FROM groups ORDER BY id")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let groups = group_stmt
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            .map(|payload| {
                let payload = payload.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                serde_json::from_str::<Group>(&payload).map_err(|err| SqliteStoreError::Decode(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rules, groups))
    }

    fn save_sync(&self, rules: &[Rule], groups: &[Group]) -> Result<(), SqliteStoreError> {
        let mut connection = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute("DELETE FROM rules", params![]).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute("DELETE FROM groups", params![]).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        for rule in rules {
            let payload =
                serde_json::to_string(rule).map_err(|err| SqliteStoreError::Decode(err.to_string()))?;
            tx.execute(
                "INSERT INTO rules (id, payload) VALUES (?1, ?2)",
                params![rule.id.as_str(), payload],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        for group in groups {
            let payload =
                serde_json::to_string(group).map_err(|err| SqliteStoreError::Decode(err.to_string()))?;
            tx.execute(
                "INSERT INTO groups (id, payload) VALUES (?1, ?2)",
                params![group.id.as_str(), payload],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RulePersistence for SqliteRulePersistence {
    async fn load(&self) -> Result<(Vec<Rule>, Vec<Group>), PersistenceError> {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let store = SqliteRulePersistence { connection };
            store.load_sync()
        })
        .await
        .map_err(|err| PersistenceError::Io(err.to_string()))?
        .map_err(PersistenceError::from)
    }

    async fn save(&self, rules: &[Rule], groups: &[Group]) -> Result<(), PersistenceError> {
        let connection = Arc::clone(&self.connection);
        let rules = rules.to_vec();
        let groups = groups.to_vec();
        tokio::task::spawn_blocking(move || {
            let store = SqliteRulePersistence { connection };
            store.save_sync(&rules, &groups)
        })
        .await
        .map_err(|err| PersistenceError::Io(err.to_string()))?
        .map_err(PersistenceError::from)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Invalid("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let text = path.display().to_string();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

fn open_connection(path: &Path) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if version.is_none() {
        tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS rules (id TEXT PRIMARY KEY, payload TEXT NOT NULL);
         CREATE TABLE IF NOT EXISTS groups (id TEXT PRIMARY KEY, payload TEXT NOT NULL);",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules_core::GroupId;
    use rules_core::RuleId;
    use rules_core::Trigger;
    use rules_logic::Requirement;

    fn temp_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("rules.db")
    }

    fn sample_rule() -> Rule {
        Rule {
            id: RuleId::new("r1"),
            name: "sample".to_string(),
            priority: 0,
            enabled: true,
            tags: std::collections::BTreeSet::new(),
            group: None,
            trigger: Trigger::Fact { pattern: "device:*:status".to_string() },
            requirements: Vec::new(),
            conditions: Requirement::and(vec![]),
            actions: Vec::new(),
            version: 1,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn round_trips_rules_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRulePersistence::new(SqliteStoreConfig::new(temp_path(&dir))).unwrap();
        let rule = sample_rule();
        let group = Group::new(GroupId::new("g1"), "group-one", 0);
        store.save(std::slice::from_ref(&rule), std::slice::from_ref(&group)).await.unwrap();

        let (loaded_rules, loaded_groups) = store.load().await.unwrap();
        assert_eq!(loaded_rules.len(), 1);
        assert_eq!(loaded_rules[0].id, rule.id);
        assert_eq!(loaded_groups.len(), 1);
        assert_eq!(loaded_groups[0].id, group.id);
    }

    #[tokio::test]
    async fn save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRulePersistence::new(SqliteStoreConfig::new(temp_path(&dir))).unwrap();
        store.save(&[sample_rule()], &[]).await.unwrap();
        store.save(&[], &[]).await.unwrap();
        let (rules, groups) = store.load().await.unwrap();
        assert!(rules.is_empty());
        assert!(groups.is_empty());
    }
}
