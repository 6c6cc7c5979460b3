//! Key-value persistence adapter.
//!
//! Two layers over a [`KeyValueStore`]:
//! - strict (`try_*`): every failure comes back as a [`StorageError`]
//! - best-effort (`save`, `load`, `remove`): failures are logged and absorbed,
//!   reads fall back to the caller's default, lost writes are only logged
//!
//! Higher layers use the best-effort half so a full or broken store never
//! takes the UI down. A `save` returning is not a durability guarantee.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{KeyValueStore, StorageError};

#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    // ── Strict layer ────────────────────────────────────────

    /// Serialize `value` as JSON and write it under `key`.
    pub fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }

    /// Read and deserialize `key`. `Ok(None)` when the key is absent.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Raw stored text under `key`, without deserializing.
    pub fn try_load_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    pub fn try_remove(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key)
    }

    // ── Best-effort layer ───────────────────────────────────

    /// Write `value` under `key`, logging and dropping any failure.
    /// Returns whether the write landed.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_save(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to persist value, write dropped");
                false
            }
        }
    }

    /// Read `key`, returning `default` if it is absent, unreadable or malformed.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to load value, using default");
                default
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.try_remove(key) {
            tracing::warn!(key, error = %e, "Failed to remove key");
        }
    }
}
