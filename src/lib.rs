pub mod commands;
pub mod config;
pub mod connectivity;
pub mod core_state;
pub mod db;
pub mod journal;
pub mod models;
pub mod persistence;
pub mod seed;
pub mod sync;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;
use crate::config::AppConfig;
use crate::connectivity::ConnectivitySignal;
use crate::core_state::CoreState;
use crate::db::SqliteStore;
use crate::seed::SeedData;

pub fn run() {
    let cli = Cli::parse();

    // Initialize tracing
    let fallback = if cli.verbose {
        "debug"
    } else {
        config::default_log_filter()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_cli(cli)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let db_path = config::database_path(&config.data_dir);
    let store = SqliteStore::open(&db_path, config.storage_quota_bytes)
        .map_err(|e| format!("Failed to open local store at {}: {e}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "Local store opened");

    let state = Arc::new(CoreState::new(Arc::new(store), config, SeedData::defaults()));
    state.login(cli.role, None).map_err(|e| e.to_string())?;

    let connectivity = ConnectivitySignal::new(!cli.offline);
    let startup = state.init(connectivity.subscribe());

    let result = commands::execute(&state, cli.command, startup).await;
    state.dispose().await;
    result
}
