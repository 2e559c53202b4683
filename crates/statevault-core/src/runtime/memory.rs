// crates/statevault-core/src/runtime/memory.rs
// ============================================================================
// Module: State Vault In-Memory Storage
// Description: Simple in-memory key/value storage for tests and examples.
// Purpose: Provide a deterministic backend without external deps.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryStorage`] keeps values in a mutex-protected map. It can be told
//! to fail writes so callers can exercise write-failure paths. It is not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::interfaces::KeyValueStorage;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// In-memory key/value storage.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    /// Stored values.
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    /// When set, `put` and `remove` fail.
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the stored keys in order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the mutex is poisoned.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory storage mutex poisoned".to_string()))?;
        Ok(guard.keys().cloned().collect())
    }

    /// Fails when writes are disabled.
    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("in-memory storage writes disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory storage mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory storage mutex poisoned".to_string()))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory storage mutex poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}
