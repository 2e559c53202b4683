// crates/statevault-sync/src/lib.rs
// ============================================================================
// Module: State Vault Sync Library
// Description: Remote sync, auto-save scheduling, and the persistence engine.
// Purpose: Push accumulated local state to a remote store and keep it saved.
// Dependencies: statevault-core, statevault-config, tokio, async-trait
// ============================================================================

//! ## Overview
//! `statevault-sync` layers the asynchronous pieces over the synchronous
//! store in `statevault-core`:
//! - [`SyncCoordinator`] pushes [`SyncState`] to a [`RemoteStore`] with
//!   single-flight protection, bounded retries, and status accounting.
//! - [`AutoSaveScheduler`] runs a best-effort periodic save on a pluggable
//!   [`Scheduler`].
//! - [`PersistenceEngine`] wires both to a [`statevault_core::StateStore`]
//!   under one [`statevault_config::PersistenceConfig`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod autosave;
pub mod coordinator;
pub mod engine;
pub mod records;
pub mod remote;
pub mod retry;
pub mod scheduler;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use autosave::AutoSaveScheduler;
pub use autosave::SaveFn;
pub use coordinator::RECENT_ACTIVITY_LIMIT;
pub use coordinator::RECENT_TEST_RESULTS_LIMIT;
pub use coordinator::SyncCoordinator;
pub use coordinator::SyncError;
pub use coordinator::SyncStatus;
pub use engine::PersistenceEngine;
pub use records::ActivityRecord;
pub use records::ComplianceSettingsRecord;
pub use records::FailureIncidentRecord;
pub use records::RemoteSnapshot;
pub use records::SyncCategory;
pub use records::SyncState;
pub use records::TestResultRecord;
pub use remote::RemoteError;
pub use remote::RemoteStore;
pub use remote::SharedRemote;
pub use retry::RetryPolicy;
pub use scheduler::ManualScheduler;
pub use scheduler::Scheduler;
pub use scheduler::TickFn;
pub use scheduler::TimerHandle;
pub use scheduler::TokioScheduler;
