// crates/statevault-core/src/lib.rs
// ============================================================================
// Module: State Vault Core Library
// Description: Public API surface for local state persistence.
// Purpose: Expose envelopes, storage interfaces, and the store/backup/recovery runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! State Vault core persists a single "current state" snapshot to a key/value
//! backend, keeps a bounded newest-first backup history, and recovers from the
//! newest valid backup when the current snapshot fails its integrity check.
//! Everything here is synchronous; async collaborators (remote sync, timers)
//! live in `statevault-sync`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::BACKUPS_KEY;
pub use interfaces::CURRENT_STATE_KEY;
pub use interfaces::KeyValueStorage;
pub use interfaces::MigrationError;
pub use interfaces::SharedStorage;
pub use interfaces::StateMigrator;
pub use interfaces::StorageError;
pub use interfaces::StoreError;
pub use runtime::BackupHealth;
pub use runtime::BackupManager;
pub use runtime::InMemoryStorage;
pub use runtime::RecoveryEngine;
pub use runtime::StateStore;
