use crate::config::PERSISTED_KEYS;
use crate::db::utf16_byte_len;
use crate::persistence::Persistence;

/// Diagnostic byte count over the persisted collections.
#[derive(Clone)]
pub struct StorageUsage {
    persistence: Persistence,
}

impl StorageUsage {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    /// Sum of the UTF-16 byte width of every persisted collection.
    /// Absent or unreadable keys count as zero.
    pub fn get_usage(&self) -> u64 {
        PERSISTED_KEYS
            .iter()
            .map(|key| match self.persistence.try_load_raw(key) {
                Ok(Some(value)) => utf16_byte_len(&value),
                Ok(None) => 0,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Could not read key for usage");
                    0
                }
            })
            .sum()
    }
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `2.00 MB`.
pub fn format_usage(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.2} MB", b / MB)
    }
}
