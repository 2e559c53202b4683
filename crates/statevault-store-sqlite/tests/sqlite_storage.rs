// crates/statevault-store-sqlite/tests/sqlite_storage.rs
// ============================================================================
// Module: SQLite Storage Tests
// Description: Durability, path safety, and schema checks for SQLite storage.
// Purpose: Ensure the SQLite backend honors the key/value storage contract.
// Dependencies: statevault-store-sqlite, statevault-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Covers reopen durability, idempotent removal, path rejection, size limits,
//! schema version checks, and a full state store running on `SQLite`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::params;
use serde_json::Value;
use serde_json::json;
use statevault_core::CURRENT_STATE_KEY;
use statevault_core::KeyValueStorage;
use statevault_core::StateStore;
use statevault_core::StorageError;
use statevault_store_sqlite::MAX_VALUE_BYTES;
use statevault_store_sqlite::SqliteKeyValueStorage;
use statevault_store_sqlite::SqliteStoreConfig;
use statevault_store_sqlite::SqliteStoreError;
use statevault_store_sqlite::SqliteStoreMode;
use statevault_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(path: &Path) -> SqliteKeyValueStorage {
    SqliteKeyValueStorage::new(SqliteStoreConfig::for_path(path)).unwrap()
}

// ============================================================================
// SECTION: Contract
// ============================================================================

#[test]
fn values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    {
        let storage = open(&path);
        storage.put("alpha", b"one").unwrap();
        storage.put("alpha", b"two").unwrap();
        storage.put("beta", b"three").unwrap();
    }
    let storage = open(&path);
    assert_eq!(storage.get("alpha").unwrap(), Some(b"two".to_vec()));
    assert_eq!(storage.get("beta").unwrap(), Some(b"three".to_vec()));
    assert_eq!(storage.keys().unwrap(), vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn missing_key_reads_none_and_remove_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let storage = open(&dir.path().join("vault.db"));
    assert_eq!(storage.get("absent").unwrap(), None);
    storage.remove("absent").unwrap();
    storage.put("present", b"x").unwrap();
    storage.remove("present").unwrap();
    storage.remove("present").unwrap();
    assert_eq!(storage.get("present").unwrap(), None);
}

#[test]
fn creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("vault.db");
    let storage = open(&path);
    storage.put("k", b"v").unwrap();
    assert!(path.exists());
}

#[test]
fn delete_journal_and_normal_sync_are_accepted() {
    let dir = TempDir::new().unwrap();
    let config = SqliteStoreConfig {
        path: dir.path().join("vault.db"),
        busy_timeout_ms: 100,
        journal_mode: SqliteStoreMode::Delete,
        sync_mode: SqliteSyncMode::Normal,
    };
    let storage = SqliteKeyValueStorage::new(config.clone()).unwrap();
    storage.put("k", b"v").unwrap();
    assert_eq!(storage.config(), &config);
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = SqliteKeyValueStorage::new(SqliteStoreConfig::for_path(dir.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn overlong_path_component_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a".repeat(300));
    let result = SqliteKeyValueStorage::new(SqliteStoreConfig::for_path(path));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn oversized_value_is_rejected_and_previous_value_kept() {
    let dir = TempDir::new().unwrap();
    let storage = open(&dir.path().join("vault.db"));
    storage.put("k", b"small").unwrap();
    let big = vec![0_u8; MAX_VALUE_BYTES + 1];
    let err = storage.put("k", &big).unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
    assert_eq!(storage.get("k").unwrap(), Some(b"small".to_vec()));
}

#[test]
fn empty_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = open(&dir.path().join("vault.db"));
    assert!(storage.put("", b"v").is_err());
}

#[test]
fn unknown_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    drop(open(&path));
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = ?1", params![99_i64]).unwrap();
    drop(connection);
    let result = SqliteKeyValueStorage::new(SqliteStoreConfig::for_path(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

// ============================================================================
// SECTION: State Store Integration
// ============================================================================

#[test]
fn state_store_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    let bound = NonZeroUsize::new(2).unwrap();
    {
        let store: StateStore<Value> = StateStore::new(Arc::new(open(&path)), "1", bound);
        store.save(&json!({"count": 1})).unwrap();
        store.save(&json!({"count": 2})).unwrap();
    }
    let store: StateStore<Value> = StateStore::new(Arc::new(open(&path)), "1", bound);
    assert_eq!(store.load().unwrap(), Some(json!({"count": 2})));
    assert_eq!(store.backups().list().len(), 2);
}

#[test]
fn state_store_recovers_from_corrupted_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    let storage = Arc::new(open(&path));
    let store: StateStore<Value> =
        StateStore::new(storage.clone(), "1", NonZeroUsize::new(3).unwrap());
    store.save(&json!({"count": 1})).unwrap();
    store.save(&json!({"count": 2})).unwrap();

    let mut current: Value =
        serde_json::from_slice(&storage.get(CURRENT_STATE_KEY).unwrap().unwrap()).unwrap();
    current["data"]["count"] = json!(77);
    storage.put(CURRENT_STATE_KEY, &serde_json::to_vec(&current).unwrap()).unwrap();

    assert_eq!(store.load().unwrap(), Some(json!({"count": 2})));
}
