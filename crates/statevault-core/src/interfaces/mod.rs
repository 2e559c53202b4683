// crates/statevault-core/src/interfaces/mod.rs
// ============================================================================
// Module: State Vault Interfaces
// Description: Backend-agnostic storage and migration contracts.
// Purpose: Define the seams State Vault uses to reach durable storage.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The store talks to durable storage only through [`KeyValueStorage`]. Two
//! keys are used: [`CURRENT_STATE_KEY`] for the latest envelope and
//! [`BACKUPS_KEY`] for the backup list. Implementations must replace a key's
//! value atomically so a failed write never leaves a half-written record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Storage Keys
// ============================================================================

/// Key holding the serialized current [`crate::StateEnvelope`].
pub const CURRENT_STATE_KEY: &str = "state.current";
/// Key holding the serialized newest-first [`crate::Backup`] list.
pub const BACKUPS_KEY: &str = "state.backups";

// ============================================================================
// SECTION: Key/Value Storage
// ============================================================================

/// Errors reported by storage backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend I/O failure.
    #[error("storage io error: {0}")]
    Io(String),
    /// Backend is not usable (closed, misconfigured, quota exceeded).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable key/value storage.
///
/// # Invariants
/// - `put` replaces the whole value atomically.
/// - `remove` on a missing key succeeds.
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails; the previous value must
    /// then remain intact.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Removes `key` if present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Shared storage handle.
pub type SharedStorage = Arc<dyn KeyValueStorage>;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors surfaced by the state store.
///
/// Integrity failures and exhausted recovery are not represented here; they
/// are absorbed by `load`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable write failed; the state may not have been saved.
    #[error("state write failed: {0}")]
    Write(String),
    /// Current record was written but the backup was not.
    #[error("state saved but backup failed: {0}")]
    Backup(String),
    /// Durable read failed.
    #[error("state read failed: {0}")]
    Read(String),
    /// State could not be serialized.
    #[error("state encode failed: {0}")]
    Encode(String),
    /// Valid envelope could not be decoded into the state type.
    #[error("state decode failed: {0}")]
    Decode(String),
    /// Envelope version differs and no migration applied.
    #[error("state version mismatch: stored {stored}, expected {expected}")]
    VersionMismatch {
        /// Version recorded in the envelope.
        stored: String,
        /// Version the store was built for.
        expected: String,
    },
    /// Export bundle was rejected.
    #[error("invalid export bundle: {0}")]
    InvalidBundle(String),
}

// ============================================================================
// SECTION: Migration
// ============================================================================

/// Migration failure reported by a [`StateMigrator`].
#[derive(Debug, Clone, Error)]
#[error("migration from version {from} failed: {reason}")]
pub struct MigrationError {
    /// Source version.
    pub from: String,
    /// Failure reason.
    pub reason: String,
}

/// Upgrades payloads written under an older schema version.
pub trait StateMigrator: Send + Sync {
    /// Converts `data` written at `from_version` into the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when the version is unknown or conversion
    /// fails.
    fn migrate(&self, from_version: &str, data: Value) -> Result<Value, MigrationError>;
}
