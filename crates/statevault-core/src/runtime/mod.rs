// crates/statevault-core/src/runtime/mod.rs
// ============================================================================
// Module: State Vault Runtime
// Description: State store, backup rotation, recovery, and in-memory storage.
// Purpose: Implement durable save/load on top of the storage interface.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`StateStore`] is the entry point. Each save writes the current record and
//! then asks [`BackupManager`] to rotate the history; each load validates the
//! current record and hands off to [`RecoveryEngine`] when it fails.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod backups;
pub mod memory;
pub mod recovery;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use backups::BackupManager;
pub use memory::InMemoryStorage;
pub use recovery::BackupHealth;
pub use recovery::RecoveryEngine;
pub use store::StateStore;
