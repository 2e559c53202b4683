// crates/statevault-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Key/Value Storage
// Description: Durable KeyValueStorage backed by SQLite WAL.
// Purpose: Persist State Vault records with atomic per-key replacement.
// Dependencies: statevault-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! This module implements [`KeyValueStorage`] over a single `kv_entries`
//! table. Every `put` replaces the row for its key inside one transaction, so
//! a failed write leaves the previous value untouched. The file carries a
//! `store_meta` schema version and refuses to open databases written by an
//! unknown schema.
//! Security posture: database contents are untrusted; integrity is checked by
//! the state store above this layer, not here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use statevault_core::KeyValueStorage;
use statevault_core::StorageError;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum key length accepted by the store.
const MAX_KEY_LENGTH: usize = 512;
/// Maximum value size accepted by the store.
pub const MAX_VALUE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` key/value storage.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Returns a configuration for `path` with default pragmas.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding stored values.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or request.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Value exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StorageError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Unavailable(message)
            }
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Unavailable(format!(
                "value exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// `SQLite`-backed [`KeyValueStorage`].
///
/// # Invariants
/// - One connection is shared behind a mutex; calls are serialized.
/// - Each `put` and `remove` commits its own transaction.
pub struct SqliteKeyValueStorage {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection.
    connection: Mutex<Connection>,
}

impl SqliteKeyValueStorage {
    /// Opens an `SQLite`-backed key/value storage.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unusable or the database
    /// cannot be opened or initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        debug!(path = %config.path.display(), "opened sqlite storage");
        Ok(Self {
            config,
            connection: Mutex::new(connection),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Lists stored keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn keys(&self) -> Result<Vec<String>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare("SELECT key FROM kv_entries ORDER BY key")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Acquires the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }

    /// Reads a value.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SqliteStoreError> {
        validate_key(key)?;
        let guard = self.lock()?;
        guard
            .query_row("SELECT value FROM kv_entries WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Upserts a value in its own transaction.
    fn write(&self, key: &str, value: &[u8]) -> Result<(), SqliteStoreError> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_VALUE_BYTES,
                actual_bytes: value.len(),
            });
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = \
             excluded.updated_at",
            params![key, value, unix_millis()],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Deletes a value; missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), SqliteStoreError> {
        validate_key(key)?;
        let guard = self.lock()?;
        guard
            .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }
}

impl KeyValueStorage for SqliteKeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.read(key).map_err(StorageError::from)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.write(key, value).map_err(StorageError::from)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.delete(key).map_err(StorageError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Validates a storage key.
fn validate_key(key: &str) -> Result<(), SqliteStoreError> {
    if key.is_empty() {
        return Err(SqliteStoreError::Invalid("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(SqliteStoreError::Invalid("key exceeds length limit".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_entries (
                    key TEXT PRIMARY KEY NOT NULL,
                    value BLOB NOT NULL,
                    updated_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
