// crates/statevault-sync/src/engine.rs
// ============================================================================
// Module: Persistence Engine
// Description: Constructible facade over store, sync, and auto-save.
// Purpose: Give hosts one service configured by a single PersistenceConfig.
// Dependencies: statevault-core, statevault-config, serde, tracing
// ============================================================================

//! ## Overview
//! [`PersistenceEngine`] owns a [`StateStore`], a [`SyncCoordinator`], and
//! an [`AutoSaveScheduler`], and keeps all three aligned with the active
//! [`PersistenceConfig`]. A config change through [`PersistenceEngine::update_config`]
//! updates the backup bound for later saves, the retry policy for later
//! syncs, and restarts a running auto-save timer with the new interval.
//!
//! There is no global instance; hosts construct one and inject fakes in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Serialize;
use serde::de::DeserializeOwned;
use statevault_config::ConfigError;
use statevault_config::PersistenceConfig;
use statevault_config::PersistenceConfigOverrides;
use statevault_core::ExportBundle;
use statevault_core::StateEnvelope;
use statevault_core::StateStore;
use statevault_core::StoreError;
use tracing::debug;
use tracing::info;

use crate::autosave::AutoSaveScheduler;
use crate::autosave::SaveFn;
use crate::coordinator::SyncCoordinator;
use crate::coordinator::SyncError;
use crate::coordinator::SyncStatus;
use crate::records::RemoteSnapshot;
use crate::records::SyncState;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Local persistence plus remote sync under one configuration.
pub struct PersistenceEngine<T> {
    /// Active configuration.
    config: Mutex<PersistenceConfig>,
    /// Local store.
    store: Arc<StateStore<T>>,
    /// Remote sync.
    coordinator: SyncCoordinator,
    /// Periodic save driver.
    autosave: AutoSaveScheduler,
}

impl<T> PersistenceEngine<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Builds an engine and aligns `store` and `coordinator` with `config`.
    #[must_use]
    pub fn new(
        config: PersistenceConfig,
        store: StateStore<T>,
        coordinator: SyncCoordinator,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        store.backups().set_max_backup_count(config.max_backup_count());
        coordinator.set_retry_policy(RetryPolicy::from_config(&config));
        Self {
            config: Mutex::new(config),
            store: Arc::new(store),
            coordinator,
            autosave: AutoSaveScheduler::new(scheduler, config),
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> PersistenceConfig {
        *self.lock_config()
    }

    /// Returns the local store.
    #[must_use]
    pub fn store(&self) -> &StateStore<T> {
        &self.store
    }

    /// Returns the sync coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Returns the auto-save scheduler.
    #[must_use]
    pub const fn autosave(&self) -> &AutoSaveScheduler {
        &self.autosave
    }

    /// Saves `state` locally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state cannot be encoded or written;
    /// [`StoreError::Backup`] means the state itself was saved.
    pub fn save(&self, state: &T) -> Result<StateEnvelope, StoreError> {
        self.store.save(state)
    }

    /// Loads local state, recovering from backups when needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage cannot be read or for version or
    /// decode problems.
    pub fn load(&self) -> Result<Option<T>, StoreError> {
        self.store.load()
    }

    /// Removes local state and backups.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when storage cannot be written.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.store.clear_all()
    }

    /// Exports local state and backups.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the current record cannot be read.
    pub fn export_state(&self) -> Result<ExportBundle, StoreError> {
        self.store.export_state()
    }

    /// Overwrites local state and backups with `bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the bundle is rejected or a write fails.
    pub fn import_state(&self, bundle: ExportBundle) -> Result<(), StoreError> {
        self.store.import_state(bundle)
    }

    /// Pushes `state` to the remote store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when a sync is in flight or a push fails.
    pub async fn sync(&self, state: &SyncState) -> Result<(), SyncError> {
        self.coordinator.sync(state).await
    }

    /// Syncs after reconnecting when `sync_on_connect` is enabled.
    ///
    /// Returns whether a sync ran.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the triggered sync fails.
    pub async fn on_connect(&self, state: &SyncState) -> Result<bool, SyncError> {
        if !self.config().sync_on_connect() {
            debug!("connection restored; sync_on_connect disabled");
            return Ok(false);
        }
        info!(
            facility = %self.coordinator.facility_id(),
            items = state.item_count(),
            "connection restored; syncing"
        );
        self.coordinator.sync(state).await?;
        Ok(true)
    }

    /// Loads the authoritative remote view.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Load`] when a remote loader fails.
    pub async fn load_from_remote(&self) -> Result<RemoteSnapshot, SyncError> {
        self.coordinator.load_from_remote().await
    }

    /// Returns a copy of the sync status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.coordinator.status()
    }

    /// Stops periodic saving. Idempotent.
    pub fn stop_auto_save(&self) {
        self.autosave.stop();
    }

    /// Merges `overrides` into the active config and applies the result.
    ///
    /// On error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the merged config is invalid.
    pub fn update_config(
        &self,
        overrides: &PersistenceConfigOverrides,
    ) -> Result<PersistenceConfig, ConfigError> {
        let mut current = self.lock_config();
        let next = current.merged(overrides)?;
        self.store.backups().set_max_backup_count(next.max_backup_count());
        self.coordinator.set_retry_policy(RetryPolicy::from_config(&next));
        self.autosave.reconfigure(next);
        *current = next;
        drop(current);
        info!(
            auto_save = next.auto_save(),
            max_backup_count = next.max_backup_count().get(),
            retry_attempts = next.retry_attempts(),
            "persistence config updated"
        );
        Ok(next)
    }

    /// Locks the config, recovering from poisoning.
    fn lock_config(&self) -> MutexGuard<'_, PersistenceConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> PersistenceEngine<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Starts periodic saving of whatever `snapshot` returns.
    pub fn start_auto_save<F>(&self, snapshot: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let store = Arc::clone(&self.store);
        let save_fn: SaveFn = Arc::new(move || store.save(&snapshot()).map(|_| ()));
        self.autosave.start(save_fn);
    }
}
