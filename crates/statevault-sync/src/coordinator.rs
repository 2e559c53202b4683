// crates/statevault-sync/src/coordinator.rs
// ============================================================================
// Module: Sync Coordinator
// Description: Single-flight push of local state to the remote store.
// Purpose: Sync test results, incidents, and settings with status accounting.
// Dependencies: statevault-core, tokio, tracing, thiserror, time
// ============================================================================

//! ## Overview
//! [`SyncCoordinator::sync`] pushes a [`SyncState`] in a fixed order: test
//! results, then incidents, then settings. The first record whose remote call
//! fails for good ends the sync; the failure is recorded in [`SyncStatus`]
//! and returned to the caller.
//!
//! Only one sync runs at a time. A second call while one is in flight is
//! rejected with [`SyncError::AlreadyInProgress`] and has no side effects.
//! The in-flight flag is released by a drop guard, so it is cleared on
//! success, on failure, and when the sync future is dropped mid-flight.
//!
//! No lock is held across an `.await`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use statevault_config::PersistenceConfig;
use statevault_config::SyncConfig;
use statevault_core::SharedClock;
use statevault_core::SystemClock;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use tracing::warn;

use crate::records::RemoteSnapshot;
use crate::records::SyncCategory;
use crate::records::SyncState;
use crate::remote::RemoteError;
use crate::remote::SharedRemote;
use crate::retry::RetryPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of recent activity entries loaded from the remote.
pub const RECENT_ACTIVITY_LIMIT: usize = 20;
/// Number of recent test results loaded from the remote.
pub const RECENT_TEST_RESULTS_LIMIT: usize = 50;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Snapshot of sync progress.
///
/// # Invariants
/// - `is_syncing` is false whenever no sync is in flight.
/// - `pending_changes` is 0 after a fully successful sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Completion time of the last fully successful sync.
    pub last_sync_time: Option<OffsetDateTime>,
    /// Whether a sync is in flight.
    pub is_syncing: bool,
    /// Local changes not yet confirmed by the remote.
    pub pending_changes: usize,
    /// Failed pushes since the last successful sync or reset.
    pub failed_changes: usize,
    /// Error entries of the most recent sync, as `"<category> <id>: <error>"`.
    pub sync_errors: Vec<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync is already in flight.
    #[error("sync already in progress")]
    AlreadyInProgress,
    /// A record could not be pushed.
    #[error("sync failed for {category} {item_id}: {source}")]
    Remote {
        /// Category of the failed record.
        category: SyncCategory,
        /// Identifier of the failed record.
        item_id: String,
        /// Final remote error.
        source: RemoteError,
    },
    /// A remote load failed.
    #[error("remote load failed during {operation}: {source}")]
    Load {
        /// Loader that failed.
        operation: &'static str,
        /// Final remote error.
        source: RemoteError,
    },
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Pushes local state to a remote store, one sync at a time.
pub struct SyncCoordinator {
    /// Remote store.
    remote: SharedRemote,
    /// Facility used as settings conflict key and for loads.
    facility_id: String,
    /// Time source for `last_sync_time`.
    clock: SharedClock,
    /// Active retry policy.
    retry: Mutex<RetryPolicy>,
    /// Status owned by the coordinator.
    status: Mutex<SyncStatus>,
    /// Single-flight flag.
    in_flight: AtomicBool,
}

impl SyncCoordinator {
    /// Creates a coordinator for `facility_id` using the system clock.
    #[must_use]
    pub fn new(remote: SharedRemote, facility_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self::with_clock(remote, facility_id, retry, Arc::new(SystemClock))
    }

    /// Creates a coordinator from the `[sync]` facility and the persistence
    /// retry settings.
    ///
    /// Returns `None` when no facility is configured.
    #[must_use]
    pub fn from_config(
        remote: SharedRemote,
        sync: &SyncConfig,
        persistence: &PersistenceConfig,
    ) -> Option<Self> {
        let facility_id = sync.facility_id.as_deref()?;
        Some(Self::new(remote, facility_id, RetryPolicy::from_config(persistence)))
    }

    /// Creates a coordinator with an explicit clock.
    #[must_use]
    pub fn with_clock(
        remote: SharedRemote,
        facility_id: impl Into<String>,
        retry: RetryPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            remote,
            facility_id: facility_id.into(),
            clock,
            retry: Mutex::new(retry),
            status: Mutex::new(SyncStatus::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Returns the facility this coordinator syncs.
    #[must_use]
    pub fn facility_id(&self) -> &str {
        &self.facility_id
    }

    /// Returns the active retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        *self.retry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the retry policy used by later syncs.
    pub fn set_retry_policy(&self, policy: RetryPolicy) {
        *self.retry.lock().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    /// Returns a copy of the current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.lock_status().clone()
    }

    /// Clears counters, errors, and `last_sync_time`.
    ///
    /// An in-flight sync keeps `is_syncing` set.
    pub fn reset_status(&self) {
        let mut status = self.lock_status();
        let is_syncing = status.is_syncing;
        *status = SyncStatus {
            is_syncing,
            ..SyncStatus::default()
        };
    }

    /// Marks `count` local edits as awaiting sync.
    pub fn record_local_changes(&self, count: usize) {
        let mut status = self.lock_status();
        status.pending_changes = status.pending_changes.saturating_add(count);
    }

    /// Pushes `state` to the remote store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyInProgress`] when a sync is in flight and
    /// [`SyncError::Remote`] for the first record that could not be pushed.
    pub async fn sync(&self, state: &SyncState) -> Result<(), SyncError> {
        let _guard = self.begin(state.item_count())?;
        let policy = self.retry_policy();
        let remote = &self.remote;

        for record in &state.test_results {
            self.push(SyncCategory::TestResult, &record.id, &policy, || {
                remote.create_or_update_test_result(record)
            })
            .await?;
        }
        for record in &state.incidents {
            self.push(SyncCategory::Incident, &record.id, &policy, || {
                remote.create_failure_incident(record)
            })
            .await?;
        }
        if let Some(settings) = &state.settings {
            let conflict_key = self.facility_id.as_str();
            self.push(SyncCategory::Settings, &settings.id, &policy, || {
                remote.upsert_compliance_settings(settings, conflict_key)
            })
            .await?;
        }

        {
            let mut status = self.lock_status();
            status.last_sync_time = Some(self.clock.now());
            status.pending_changes = 0;
            status.failed_changes = 0;
        }
        info!(items = state.item_count(), facility_id = %self.facility_id, "sync completed");
        Ok(())
    }

    /// Loads the authoritative remote view for this facility.
    ///
    /// Read-only: sync status and local state are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Load`] when any loader fails after retries.
    pub async fn load_from_remote(&self) -> Result<RemoteSnapshot, SyncError> {
        let policy = self.retry_policy();
        let remote = &self.remote;
        let facility = self.facility_id.as_str();

        let incidents = load_with(&policy, "load_incident_history", || {
            remote.load_incident_history(facility)
        })
        .await?;
        let settings = load_with(&policy, "load_compliance_settings", || {
            remote.load_compliance_settings(facility)
        })
        .await?;
        let recent_activity = load_with(&policy, "load_recent_activity", || {
            remote.load_recent_activity(facility, RECENT_ACTIVITY_LIMIT)
        })
        .await?;
        let recent_test_results = load_with(&policy, "load_recent_test_results", || {
            remote.load_recent_test_results(facility, RECENT_TEST_RESULTS_LIMIT)
        })
        .await?;

        Ok(RemoteSnapshot {
            incidents,
            settings,
            recent_activity,
            recent_test_results,
        })
    }

    /// Claims the single-flight slot and resets per-sync status.
    fn begin(&self, items: usize) -> Result<InFlightGuard<'_>, SyncError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("sync rejected; another sync is in flight");
            return Err(SyncError::AlreadyInProgress);
        }
        let mut status = self.lock_status();
        status.is_syncing = true;
        status.sync_errors.clear();
        status.pending_changes = items;
        drop(status);
        Ok(InFlightGuard {
            coordinator: self,
        })
    }

    /// Pushes one record and updates status with the outcome.
    async fn push<F, Fut>(
        &self,
        category: SyncCategory,
        item_id: &str,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<(), SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), RemoteError>>,
    {
        match policy.run(category.as_str(), op).await {
            Ok(()) => {
                let mut status = self.lock_status();
                status.pending_changes = status.pending_changes.saturating_sub(1);
                Ok(())
            }
            Err(source) => {
                warn!(%category, item_id, error = %source, "sync push failed");
                let mut status = self.lock_status();
                status.sync_errors.push(format!("{category} {item_id}: {source}"));
                status.failed_changes = status.failed_changes.saturating_add(1);
                Err(SyncError::Remote {
                    category,
                    item_id: item_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Locks the status, recovering from poisoning.
    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs a remote loader under `policy`.
async fn load_with<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    op: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    policy.run(operation, op).await.map_err(|source| {
        warn!(operation, error = %source, "remote load failed");
        SyncError::Load {
            operation,
            source,
        }
    })
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Releases the single-flight slot on every exit path.
struct InFlightGuard<'a> {
    /// Owning coordinator.
    coordinator: &'a SyncCoordinator,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.lock_status().is_syncing = false;
        self.coordinator.in_flight.store(false, Ordering::Release);
    }
}
