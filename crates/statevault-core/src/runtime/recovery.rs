// crates/statevault-core/src/runtime/recovery.rs
// ============================================================================
// Module: State Vault Recovery
// Description: Newest-first cascade through backups for a valid envelope.
// Purpose: Recover usable state when the current snapshot fails validation.
// Dependencies: crate::{core, runtime::backups}, tracing
// ============================================================================

//! ## Overview
//! Recovery walks the backup list newest first and returns the first envelope
//! whose checksum verifies. It is strictly read-only: invalid entries are
//! skipped, never pruned, so a later attempt (for example after a checksum
//! fix) still sees the full history.
//!
//! "No backups" and "all backups invalid" both yield `None`; only the logs
//! tell them apart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::core::ChecksumValidator;
use crate::core::StateEnvelope;
use crate::runtime::backups::BackupManager;

// ============================================================================
// SECTION: Backup Health
// ============================================================================

/// Validation outcome for a single backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupHealth {
    /// Backup identifier.
    pub id: String,
    /// Backup sequence number.
    pub sequence: u64,
    /// Backup timestamp.
    pub timestamp: String,
    /// Schema version of the wrapped envelope.
    pub version: String,
    /// Whether the wrapped envelope verifies.
    pub valid: bool,
    /// Failure reason when invalid.
    pub reason: Option<String>,
}

// ============================================================================
// SECTION: Recovery Engine
// ============================================================================

/// Cascading, read-only recovery over the backup list.
#[derive(Clone)]
pub struct RecoveryEngine {
    /// Backup source.
    backups: BackupManager,
    /// Envelope validator.
    validator: ChecksumValidator,
}

impl RecoveryEngine {
    /// Creates a recovery engine over `backups`.
    #[must_use]
    pub const fn new(backups: BackupManager, validator: ChecksumValidator) -> Self {
        Self {
            backups,
            validator,
        }
    }

    /// Returns the newest valid backed-up envelope, or `None` when exhausted.
    #[must_use]
    pub fn recover(&self) -> Option<StateEnvelope> {
        let backups = self.backups.list();
        if backups.is_empty() {
            warn!("recovery requested but no backups exist");
            return None;
        }
        for backup in &backups {
            match self.validator.verify(&backup.data) {
                Ok(()) => {
                    info!(
                        backup_id = %backup.id,
                        sequence = backup.sequence,
                        "recovered state from backup"
                    );
                    return Some(backup.data.clone());
                }
                Err(err) => {
                    warn!(backup_id = %backup.id, error = %err, "skipping invalid backup");
                }
            }
        }
        warn!(inspected = backups.len(), "recovery exhausted; no valid backup found");
        None
    }

    /// Reports the validity of every backup, newest first.
    #[must_use]
    pub fn inspect(&self) -> Vec<BackupHealth> {
        self.backups
            .list()
            .into_iter()
            .map(|backup| {
                let outcome = self.validator.verify(&backup.data);
                BackupHealth {
                    id: backup.id,
                    sequence: backup.sequence,
                    timestamp: backup.timestamp,
                    version: backup.version,
                    valid: outcome.is_ok(),
                    reason: outcome.err().map(|err| err.to_string()),
                }
            })
            .collect()
    }
}
