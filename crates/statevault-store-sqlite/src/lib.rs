// crates/statevault-store-sqlite/src/lib.rs
// ============================================================================
// Module: State Vault SQLite Store
// Description: SQLite-backed key/value storage for State Vault.
// Purpose: Provide a durable [`KeyValueStorage`] for production deployments.
// Dependencies: statevault-core, rusqlite
// ============================================================================

//! ## Overview
//! Exposes [`SqliteKeyValueStorage`], a durable implementation of
//! [`statevault_core::KeyValueStorage`] built on a single `SQLite` file.
//!
//! [`KeyValueStorage`]: statevault_core::KeyValueStorage

pub mod store;

pub use store::MAX_VALUE_BYTES;
pub use store::SqliteKeyValueStorage;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
