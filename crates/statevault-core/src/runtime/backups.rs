// crates/statevault-core/src/runtime/backups.rs
// ============================================================================
// Module: State Vault Backup Rotation
// Description: Bounded, newest-first backup history under `state.backups`.
// Purpose: Keep recovery material for the last N successful saves.
// Dependencies: crate::{core, interfaces}, serde_json, tracing
// ============================================================================

//! ## Overview
//! Every successful save prepends one [`Backup`] and drops the oldest entries
//! beyond the retention bound. The list is always rewritten in full so
//! ordering and truncation land in a single storage write.
//!
//! Reads never fail: an unreadable or unparseable list is logged and treated
//! as empty, which means "no recovery material available".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::warn;

use crate::core::Backup;
use crate::core::SharedClock;
use crate::core::StateEnvelope;
use crate::core::clock::unix_millis;
use crate::interfaces::BACKUPS_KEY;
use crate::interfaces::SharedStorage;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Backup Manager
// ============================================================================

/// Maintains the bounded backup list.
///
/// # Invariants
/// - The stored list is newest-first.
/// - After `record`, the list holds at most `max_backup_count` entries.
#[derive(Clone)]
pub struct BackupManager {
    /// Backing storage.
    storage: SharedStorage,
    /// Clock used for backup identifiers.
    clock: SharedClock,
    /// Retention bound, always non-zero.
    max_backup_count: Arc<AtomicUsize>,
}

impl BackupManager {
    /// Creates a manager retaining at most `max_backup_count` backups.
    #[must_use]
    pub fn new(storage: SharedStorage, clock: SharedClock, max_backup_count: NonZeroUsize) -> Self {
        Self {
            storage,
            clock,
            max_backup_count: Arc::new(AtomicUsize::new(max_backup_count.get())),
        }
    }

    /// Returns the retention bound.
    #[must_use]
    pub fn max_backup_count(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_backup_count.load(Ordering::SeqCst)).unwrap_or(NonZeroUsize::MIN)
    }

    /// Changes the retention bound.
    ///
    /// Existing entries beyond a lowered bound are dropped on the next
    /// [`BackupManager::record`].
    pub fn set_max_backup_count(&self, max_backup_count: NonZeroUsize) {
        self.max_backup_count.store(max_backup_count.get(), Ordering::SeqCst);
    }

    /// Records a backup of `envelope` and rotates out the oldest entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when the list cannot be written back.
    pub fn record(&self, envelope: &StateEnvelope) -> Result<Backup, StoreError> {
        let mut backups = self.list();
        let sequence = backups.first().map_or(1, |newest| newest.sequence.saturating_add(1));
        let backup = Backup::from_envelope(envelope, sequence, unix_millis(self.clock.now()));
        backups.insert(0, backup.clone());
        let bound = self.max_backup_count().get();
        if backups.len() > bound {
            debug!(dropped = backups.len() - bound, "rotating out oldest backups");
            backups.truncate(bound);
        }
        self.write(&backups)?;
        Ok(backup)
    }

    /// Returns the backups, newest first.
    ///
    /// Never fails; read or parse errors yield an empty list.
    #[must_use]
    pub fn list(&self) -> Vec<Backup> {
        let bytes = match self.storage.get(BACKUPS_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "backup list unreadable; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<Backup>>(&bytes) {
            Ok(backups) => backups,
            Err(err) => {
                warn!(error = %err, "backup list malformed; treating as empty");
                Vec::new()
            }
        }
    }

    /// Replaces the whole list, keeping at most the retention bound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when the list cannot be written.
    pub fn replace_all(&self, mut backups: Vec<Backup>) -> Result<(), StoreError> {
        let bound = self.max_backup_count().get();
        if backups.len() > bound {
            warn!(
                supplied = backups.len(),
                retained = bound,
                "replacement backup list exceeds retention; dropping oldest"
            );
            backups.truncate(bound);
        }
        self.write(&backups)
    }

    /// Removes every backup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when the key cannot be removed.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.storage.remove(BACKUPS_KEY).map_err(|err| StoreError::Write(err.to_string()))
    }

    /// Serializes and writes the list in one storage call.
    fn write(&self, backups: &[Backup]) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(backups).map_err(|err| StoreError::Encode(err.to_string()))?;
        self.storage.put(BACKUPS_KEY, &bytes).map_err(|err| StoreError::Write(err.to_string()))
    }
}
