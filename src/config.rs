use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "AquaGuard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage key for the full symptom report collection.
pub const REPORTS_KEY: &str = "aquaguard_reports";
/// Storage key for reports captured while offline.
pub const OFFLINE_QUEUE_KEY: &str = "aquaguard_offline_queue";
/// Storage key for health-worker safety tips.
pub const TIPS_KEY: &str = "aquaguard_tips";

/// Every key the persistence layer owns, in reporting order.
pub const PERSISTED_KEYS: [&str; 3] = [REPORTS_KEY, OFFLINE_QUEUE_KEY, TIPS_KEY];

/// Simulated backend round-trip before queued reports are committed.
pub const DEFAULT_SYNC_DELAY_MS: u64 = 2_000;
/// How long the "synced" banner stays up before returning to idle.
pub const DEFAULT_SYNCED_DISPLAY_MS: u64 = 3_000;
/// Byte budget of the local store (browser local storage is ~5 MiB).
pub const DEFAULT_STORAGE_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

const ENV_SYNC_DELAY_MS: &str = "AQUAGUARD_SYNC_DELAY_MS";
const ENV_SYNCED_DISPLAY_MS: &str = "AQUAGUARD_SYNCED_DISPLAY_MS";
const ENV_STORAGE_QUOTA_BYTES: &str = "AQUAGUARD_STORAGE_QUOTA_BYTES";
const ENV_DATA_DIR: &str = "AQUAGUARD_DATA_DIR";

/// Get the application data directory
/// ~/AquaGuard/ unless `AQUAGUARD_DATA_DIR` overrides it.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Path of the SQLite file backing the key-value store.
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("aquaguard.db")
}

/// Default directory for exported health logs.
pub fn exports_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("exports")
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,aquaguard_lib=debug"
}

/// Runtime tunables for the state container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub sync_delay: Duration,
    pub synced_display: Duration,
    /// `None` disables quota enforcement.
    pub storage_quota_bytes: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            sync_delay: Duration::from_millis(DEFAULT_SYNC_DELAY_MS),
            synced_display: Duration::from_millis(DEFAULT_SYNCED_DISPLAY_MS),
            storage_quota_bytes: Some(DEFAULT_STORAGE_QUOTA_BYTES),
        }
    }
}

impl AppConfig {
    /// Defaults, overridden by any `AQUAGUARD_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = parse_u64(&lookup, ENV_SYNC_DELAY_MS) {
            config.sync_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, ENV_SYNCED_DISPLAY_MS) {
            config.synced_display = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_u64(&lookup, ENV_STORAGE_QUOTA_BYTES) {
            // 0 means "no quota"
            config.storage_quota_bytes = (bytes > 0).then_some(bytes);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring non-numeric config override");
            None
        }
    }
}
