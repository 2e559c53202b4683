// crates/statevault-core/src/core/envelope.rs
// ============================================================================
// Module: State Vault Envelopes
// Description: Snapshot envelope, backup entry, and export bundle records.
// Purpose: Define the serialized records stored under the state keys.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`StateEnvelope`] wraps the application payload with its schema version,
//! creation time, and checksum. Envelopes are immutable: every save builds a
//! fresh one. A [`Backup`] is a timestamped copy of an envelope kept in the
//! bounded history.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::HashDigest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Format tag written into every export bundle.
pub const EXPORT_FORMAT: &str = "statevault.export.v1";

// ============================================================================
// SECTION: State Envelope
// ============================================================================

/// Durable wrapper around an application state payload.
///
/// # Invariants
/// - Valid iff recomputing the digest of `data` yields `checksum`.
/// - Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnvelope {
    /// Application payload as JSON.
    pub data: Value,
    /// Schema version of `data` at write time.
    pub version: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Digest of `data`.
    pub checksum: HashDigest,
}

// ============================================================================
// SECTION: Backup
// ============================================================================

/// Immutable, timestamped copy of a saved envelope.
///
/// # Invariants
/// - `sequence` strictly increases from older to newer backups.
/// - `version`, `timestamp`, and `checksum` mirror the wrapped envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    /// Unique identifier (`backup-<unix_millis>-<sequence>`).
    pub id: String,
    /// Creation-order sequence number.
    pub sequence: u64,
    /// RFC 3339 time of the wrapped save.
    pub timestamp: String,
    /// Schema version of the wrapped envelope.
    pub version: String,
    /// Checksum of the wrapped envelope.
    pub checksum: HashDigest,
    /// Wrapped envelope.
    pub data: StateEnvelope,
}

impl Backup {
    /// Builds a backup of `envelope` with the given sequence and creation millis.
    #[must_use]
    pub fn from_envelope(envelope: &StateEnvelope, sequence: u64, created_millis: i64) -> Self {
        Self {
            id: format!("backup-{created_millis}-{sequence}"),
            sequence,
            timestamp: envelope.timestamp.clone(),
            version: envelope.version.clone(),
            checksum: envelope.checksum.clone(),
            data: envelope.clone(),
        }
    }
}

// ============================================================================
// SECTION: Export Bundle
// ============================================================================

/// Portable snapshot of the current record and every backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    /// Bundle format tag; must equal [`EXPORT_FORMAT`] on import.
    pub format: String,
    /// Current envelope, if one existed at export time.
    pub state: Option<StateEnvelope>,
    /// Backups, newest first.
    pub backups: Vec<Backup>,
    /// RFC 3339 export time.
    pub export_date: String,
    /// State schema version of the exporting store.
    pub version: String,
}

// ============================================================================
// SECTION: Integrity Errors
// ============================================================================

/// Reasons a stored envelope cannot be trusted.
///
/// These never reach callers of `StateStore::load`; they are logged and the
/// store falls through to backup recovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Stored checksum does not match the recomputed one.
    #[error("checksum mismatch: stored {expected}, computed {actual}")]
    Mismatch {
        /// Stored digest.
        expected: String,
        /// Recomputed digest.
        actual: String,
    },
    /// Payload could not be canonicalized for hashing.
    #[error("payload cannot be hashed: {0}")]
    Unhashable(String),
    /// Stored bytes are not a well-formed envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}
