// crates/statevault-core/src/runtime/store.rs
// ============================================================================
// Module: State Vault State Store
// Description: Typed save/load of the current snapshot with backup and recovery.
// Purpose: Persist application state durably and survive corrupted snapshots.
// Dependencies: crate::{core, interfaces, runtime}, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`StateStore`] wraps a typed payload in a [`StateEnvelope`] and writes it
//! under [`CURRENT_STATE_KEY`] in a single storage call. A successful write is
//! followed by a backup rotation. Loads verify the checksum and fall back to
//! [`RecoveryEngine`] on any integrity problem; recovery exhaustion is
//! reported as `Ok(None)` so callers start from empty state. A storage read
//! failure is not an integrity problem and is returned as [`StoreError::Read`].
//!
//! Envelopes carry a schema version. A version other than the store's own is
//! passed through the configured [`StateMigrator`]; without one the load fails
//! with [`StoreError::VersionMismatch`] instead of misreading the payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::Backup;
use crate::core::ChecksumValidator;
use crate::core::EXPORT_FORMAT;
use crate::core::ExportBundle;
use crate::core::IntegrityError;
use crate::core::SharedClock;
use crate::core::StateEnvelope;
use crate::core::SystemClock;
use crate::core::clock::format_rfc3339;
use crate::interfaces::CURRENT_STATE_KEY;
use crate::interfaces::SharedStorage;
use crate::interfaces::StateMigrator;
use crate::interfaces::StoreError;
use crate::runtime::backups::BackupManager;
use crate::runtime::recovery::RecoveryEngine;

// ============================================================================
// SECTION: Current Record
// ============================================================================

/// Outcome of reading the current record.
enum CurrentRecord {
    /// Nothing stored yet.
    Missing,
    /// Stored and verified.
    Valid(StateEnvelope),
    /// Stored but unusable.
    Invalid(IntegrityError),
}

// ============================================================================
// SECTION: State Store
// ============================================================================

/// Durable store for a single typed state snapshot.
pub struct StateStore<T> {
    /// Backing storage.
    storage: SharedStorage,
    /// Backup rotation.
    backups: BackupManager,
    /// Recovery cascade.
    recovery: RecoveryEngine,
    /// Checksum validator.
    validator: ChecksumValidator,
    /// Timestamp source.
    clock: SharedClock,
    /// Schema version written into new envelopes.
    version: String,
    /// Optional migration for older envelopes.
    migrator: Option<Arc<dyn StateMigrator>>,
    /// Payload type marker.
    _state: PhantomData<fn() -> T>,
}

impl<T> StateStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a store writing envelopes tagged with `version`.
    #[must_use]
    pub fn new(
        storage: SharedStorage,
        version: impl Into<String>,
        max_backup_count: NonZeroUsize,
    ) -> Self {
        Self::with_clock(storage, version, max_backup_count, Arc::new(SystemClock))
    }

    /// Creates a store with an explicit clock.
    #[must_use]
    pub fn with_clock(
        storage: SharedStorage,
        version: impl Into<String>,
        max_backup_count: NonZeroUsize,
        clock: SharedClock,
    ) -> Self {
        let validator = ChecksumValidator::default();
        let backups = BackupManager::new(Arc::clone(&storage), Arc::clone(&clock), max_backup_count);
        let recovery = RecoveryEngine::new(backups.clone(), validator);
        Self {
            storage,
            backups,
            recovery,
            validator,
            clock,
            version: version.into(),
            migrator: None,
            _state: PhantomData,
        }
    }

    /// Installs a migrator for envelopes written under other versions.
    #[must_use]
    pub fn with_migrator(mut self, migrator: Arc<dyn StateMigrator>) -> Self {
        self.migrator = Some(migrator);
        self
    }

    /// Returns the schema version written by this store.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the backup manager.
    #[must_use]
    pub const fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Returns the recovery engine.
    #[must_use]
    pub const fn recovery(&self) -> &RecoveryEngine {
        &self.recovery
    }

    /// Saves `state` as the current snapshot and records a backup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] when the state cannot be serialized and
    /// [`StoreError::Write`] when storage rejects the current record; no
    /// backup is taken then. Returns [`StoreError::Backup`] when the current
    /// record was written but the backup could not be; the new state is
    /// durable and `load` returns it.
    pub fn save(&self, state: &T) -> Result<StateEnvelope, StoreError> {
        let data = serde_json::to_value(state).map_err(|err| StoreError::Encode(err.to_string()))?;
        let checksum = self
            .validator
            .compute_digest(&data)
            .map_err(|err| StoreError::Encode(err.to_string()))?;
        let envelope = StateEnvelope {
            data,
            version: self.version.clone(),
            timestamp: format_rfc3339(self.clock.now()),
            checksum,
        };
        let bytes =
            serde_json::to_vec(&envelope).map_err(|err| StoreError::Encode(err.to_string()))?;
        self.storage
            .put(CURRENT_STATE_KEY, &bytes)
            .map_err(|err| StoreError::Write(err.to_string()))?;
        let backup = self.backups.record(&envelope).map_err(|err| {
            warn!(error = %err, "state saved but backup failed");
            StoreError::Backup(err.to_string())
        })?;
        debug!(backup_id = %backup.id, "state saved");
        Ok(envelope)
    }

    /// Loads the current state, recovering from backups when needed.
    ///
    /// Returns `Ok(None)` when nothing was ever saved or when the current
    /// record is unusable and no backup validates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] when storage cannot be read,
    /// [`StoreError::VersionMismatch`] when the chosen envelope has a foreign
    /// version that cannot be migrated, and [`StoreError::Decode`] when a
    /// valid payload does not fit `T`.
    pub fn load(&self) -> Result<Option<T>, StoreError> {
        let envelope = match self.read_current()? {
            CurrentRecord::Missing => return Ok(None),
            CurrentRecord::Valid(envelope) => envelope,
            CurrentRecord::Invalid(reason) => {
                warn!(error = %reason, "current state failed integrity check; recovering");
                match self.recovery.recover() {
                    Some(envelope) => envelope,
                    None => return Ok(None),
                }
            }
        };
        self.decode(envelope).map(Some)
    }

    /// Returns the raw current envelope without validation or recovery.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] when storage fails and
    /// [`StoreError::Decode`] when the record is not a well-formed envelope.
    pub fn load_envelope(&self) -> Result<Option<StateEnvelope>, StoreError> {
        let Some(bytes) =
            self.storage.get(CURRENT_STATE_KEY).map_err(|err| StoreError::Read(err.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|err| StoreError::Decode(err.to_string()))
    }

    /// Removes the current record and every backup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when storage cannot be written.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.storage.remove(CURRENT_STATE_KEY).map_err(|err| StoreError::Write(err.to_string()))?;
        self.backups.clear()?;
        info!("cleared current state and backups");
        Ok(())
    }

    /// Exports the current record and all backups as a bundle.
    ///
    /// Envelopes are exported as stored, valid or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the current record cannot be read or parsed.
    pub fn export_state(&self) -> Result<ExportBundle, StoreError> {
        Ok(ExportBundle {
            format: EXPORT_FORMAT.to_string(),
            state: self.load_envelope()?,
            backups: self.backups.list(),
            export_date: format_rfc3339(self.clock.now()),
            version: self.version.clone(),
        })
    }

    /// Overwrites the current record and backups with `bundle`.
    ///
    /// No merge happens: a bundle without state removes the current record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBundle`] for an unknown bundle format and
    /// [`StoreError::Write`] when storage rejects a write.
    pub fn import_state(&self, bundle: ExportBundle) -> Result<(), StoreError> {
        if bundle.format != EXPORT_FORMAT {
            return Err(StoreError::InvalidBundle(format!(
                "unsupported bundle format {}",
                bundle.format
            )));
        }
        match &bundle.state {
            Some(envelope) => {
                let bytes = serde_json::to_vec(envelope)
                    .map_err(|err| StoreError::Encode(err.to_string()))?;
                self.storage
                    .put(CURRENT_STATE_KEY, &bytes)
                    .map_err(|err| StoreError::Write(err.to_string()))?;
            }
            None => {
                self.storage
                    .remove(CURRENT_STATE_KEY)
                    .map_err(|err| StoreError::Write(err.to_string()))?;
            }
        }
        let imported: Vec<Backup> = bundle.backups;
        let count = imported.len();
        self.backups.replace_all(imported)?;
        info!(backups = count, exported_at = %bundle.export_date, "imported state bundle");
        Ok(())
    }

    /// Reads and verifies the current record.
    ///
    /// Storage failures are returned as errors; only bytes that were read
    /// and fail parsing or verification count as integrity failures.
    fn read_current(&self) -> Result<CurrentRecord, StoreError> {
        let Some(bytes) =
            self.storage.get(CURRENT_STATE_KEY).map_err(|err| StoreError::Read(err.to_string()))?
        else {
            return Ok(CurrentRecord::Missing);
        };
        let envelope: StateEnvelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                return Ok(CurrentRecord::Invalid(IntegrityError::Malformed(err.to_string())));
            }
        };
        Ok(match self.validator.verify(&envelope) {
            Ok(()) => CurrentRecord::Valid(envelope),
            Err(err) => CurrentRecord::Invalid(err),
        })
    }

    /// Migrates if needed and decodes the payload into `T`.
    fn decode(&self, envelope: StateEnvelope) -> Result<T, StoreError> {
        let data = if envelope.version == self.version {
            envelope.data
        } else {
            let Some(migrator) = &self.migrator else {
                return Err(StoreError::VersionMismatch {
                    stored: envelope.version,
                    expected: self.version.clone(),
                });
            };
            let migrated = migrator.migrate(&envelope.version, envelope.data).map_err(|err| {
                warn!(error = %err, "state migration failed");
                StoreError::VersionMismatch {
                    stored: err.from.clone(),
                    expected: self.version.clone(),
                }
            })?;
            info!(from = %envelope.version, to = %self.version, "migrated state payload");
            migrated
        };
        serde_json::from_value(data).map_err(|err| StoreError::Decode(err.to_string()))
    }
}
