pub mod repository;
pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded writing {key}: {required} bytes needed, limit is {limit}")]
    QuotaExceeded { key: String, required: u64, limit: u64 },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Durable string-to-string store the persisted collections live in.
///
/// Implementations must make each `set` atomic for its key. Nothing is
/// promised across keys.
pub trait KeyValueStore: Send + Sync {
    /// Raw value under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Bytes a string occupies under UTF-16 accounting (2 per code unit).
pub fn utf16_byte_len(value: &str) -> u64 {
    value.encode_utf16().count() as u64 * 2
}
