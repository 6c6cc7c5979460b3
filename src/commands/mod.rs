//! Operator CLI over the state container.
//!
//! Each subcommand maps onto one handler in `journal`, `sync` or `tips`.
//! Handlers take the shared `Arc<CoreState>` and return a serializable
//! result or a user-facing error string; `execute` prints the result as
//! pretty JSON.

pub mod journal;
pub mod sync;
pub mod tips;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::core_state::{CoreError, CoreState};
use crate::models::UserRole;
use crate::sync::SyncOutcome;

/// Drain started by `CoreState::init` when the CLI comes up online.
pub type StartupSync = Option<JoinHandle<Result<SyncOutcome, CoreError>>>;

#[derive(Debug, Parser)]
#[command(name = "aquaguard")]
#[command(about = "AquaGuard - community water-safety health log", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Start with connectivity absent; new reports are queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Data directory holding the local store and exports
    #[arg(long, global = true, env = "AQUAGUARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Role to act as (villager, health_worker)
    #[arg(long, global = true, default_value = "villager")]
    pub role: UserRole,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show connectivity, queue and storage usage
    Status,

    /// Record a symptom report
    Report {
        #[arg(long)]
        village: String,

        #[arg(long)]
        symptoms: String,

        /// English translation of the symptoms
        #[arg(long)]
        symptoms_en: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        notes_en: Option<String>,
    },

    /// Mark a report resolved (health workers only)
    Resolve {
        /// Report id
        id: i64,
    },

    /// Drain the offline queue into the report store
    Sync,

    /// Write the health log to a JSON file
    Export {
        /// Output directory, defaults to <data-dir>/exports
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Replace all reports with the contents of a health log file
    Restore {
        /// Health log JSON file
        file: PathBuf,
    },

    /// Delete every report and queued report
    Clear,

    /// List or edit safety tips
    Tips {
        #[command(subcommand)]
        action: Option<TipAction>,
    },
}

#[derive(Debug, Subcommand)]
pub enum TipAction {
    /// List all tips (default)
    List,

    /// Add a tip (health workers only)
    Add {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "info")]
        icon: String,

        /// One step; repeat for several
        #[arg(long = "step")]
        steps: Vec<String>,
    },

    /// Delete a tip (health workers only)
    Delete {
        id: String,
    },
}

/// Run one command against the container and print its result.
pub async fn execute(
    state: &Arc<CoreState>,
    command: Commands,
    startup: StartupSync,
) -> Result<(), String> {
    match command {
        Commands::Status => print(&sync::status(state)?),
        Commands::Report {
            village,
            symptoms,
            symptoms_en,
            notes,
            notes_en,
        } => print(&journal::report_symptom(
            state,
            journal::ReportInput {
                village,
                symptoms,
                symptoms_en,
                notes,
                notes_en,
            },
        )?),
        Commands::Resolve { id } => print(&journal::resolve_symptom(state, id)?),
        Commands::Sync => print(&sync::sync_now(state, startup).await?),
        Commands::Export { dir } => print(&journal::export_log(state, dir)?),
        Commands::Restore { file } => print(&journal::restore_log(state, &file).await?),
        Commands::Clear => print(&journal::clear_log(state)?),
        Commands::Tips { action } => match action.unwrap_or(TipAction::List) {
            TipAction::List => print(&tips::list_tips(state)),
            TipAction::Add {
                title,
                description,
                icon,
                steps,
            } => print(&tips::add_tip(state, icon, title, description, steps)?),
            TipAction::Delete { id } => print(&tips::delete_tip(state, &id)?),
        },
    }
}

fn print<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}
