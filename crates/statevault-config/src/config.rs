// crates/statevault-config/src/config.rs
// ============================================================================
// Module: State Vault Configuration
// Description: Configuration loading and validation for State Vault.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, tracing, statevault-store-sqlite
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Resolution order is the explicit path, then the `STATEVAULT_CONFIG`
//! environment variable, then `statevault.toml` in the working directory.
//! Every table is optional and defaults apply for anything left out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use statevault_store_sqlite::SqliteStoreConfig;
use statevault_store_sqlite::SqliteStoreMode;
use statevault_store_sqlite::SqliteSyncMode;
use thiserror::Error;
use tracing::debug;

use crate::persistence::PersistenceConfig;
use crate::persistence::PersistenceConfigOverrides;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "statevault.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "STATEVAULT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of identifiers such as schema versions and facility ids.
pub(crate) const MAX_IDENTIFIER_LENGTH: usize = 128;
/// Default state schema version.
const DEFAULT_SCHEMA_VERSION: &str = "1";
/// Default `SQLite` busy timeout (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level State Vault configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateVaultConfig {
    /// Validated persistence settings.
    pub persistence: PersistenceConfig,
    /// Local storage backend.
    pub storage: StorageConfig,
    /// State schema settings.
    pub state: StateConfig,
    /// Remote sync settings.
    pub sync: SyncConfig,
}

/// Raw file layout before persistence overrides are applied.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    /// `[persistence]` table.
    #[serde(default)]
    persistence: PersistenceConfigOverrides,
    /// `[storage]` table.
    #[serde(default)]
    storage: StorageConfig,
    /// `[state]` table.
    #[serde(default)]
    state: StateConfig,
    /// `[sync]` table.
    #[serde(default)]
    sync: SyncConfig,
}

impl StateVaultConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_toml_str(content)?;
        debug!(path = %resolved.display(), "loaded statevault config");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let config = Self {
            persistence: PersistenceConfig::default().merged(&file.persistence)?,
            storage: file.storage,
            state: file.state,
            sync: file.sync,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the non-persistence tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.state.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Local storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Volatile in-memory storage.
    #[default]
    Memory,
    /// `SQLite`-backed durable storage.
    Sqlite,
}

/// Local storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Backend type.
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StorageConfig {
    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.storage_type, &self.path) {
            (StorageType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.storage_type {
            StorageType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory storage must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StorageType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite storage requires path".to_string())
                })?;
                validate_store_path(path)
            }
        }
    }
}

/// Returns the default busy timeout for `SQLite` storage.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: State / Sync
// ============================================================================

/// State schema settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateConfig {
    /// Schema version written into new envelopes.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
        }
    }
}

impl StateConfig {
    /// Validates state settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier("state.schema_version", &self.schema_version)
    }
}

/// Returns the default state schema version.
fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

/// Remote sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SyncConfig {
    /// Facility whose records are synced and loaded.
    #[serde(default)]
    pub facility_id: Option<String>,
}

impl SyncConfig {
    /// Validates sync settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.facility_id {
            Some(facility_id) => validate_identifier("sync.facility_id", facility_id),
            None => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a storage path against length constraints.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("storage.path must be non-empty".to_string()));
    }
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("storage.path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("storage.path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a short identifier string.
fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() != value.len() {
        return Err(ConfigError::Invalid(format!("{field} must not have surrounding whitespace")));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}
