use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{utf16_byte_len, KeyValueStore, StorageError};

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA synchronous=FULL;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_kv_store.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| StorageError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

/// SQLite-backed [`KeyValueStore`] with an optional byte quota.
///
/// The quota is checked against the UTF-16 width of every stored value, the
/// way a browser accounts for its local storage. A write that would push the
/// total past the limit is refused and the previous value stays in place.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    quota_bytes: Option<u64>,
}

impl SqliteStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: &Path, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::from_connection(open_database(path)?, quota_bytes))
    }

    /// In-memory store, discarded on drop.
    pub fn in_memory(quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        Ok(Self::from_connection(open_memory_database()?, quota_bytes))
    }

    pub fn from_connection(conn: Connection, quota_bytes: Option<u64>) -> Self {
        Self {
            conn: Mutex::new(conn),
            quota_bytes,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Bytes held by every key except `exclude`.
    fn usage_excluding(conn: &Connection, exclude: &str) -> Result<u64, StorageError> {
        let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key != ?1")?;
        let rows = stmt.query_map([exclude], |row| row.get::<_, String>(0))?;
        let mut total = 0u64;
        for value in rows {
            total += utf16_byte_len(&value?);
        }
        Ok(total)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;

        if let Some(limit) = self.quota_bytes {
            let required = Self::usage_excluding(&conn, key)? + utf16_byte_len(value);
            if required > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    limit,
                });
            }
        }

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }
}
