//! Connectivity and sync commands.
//!
//! - `status`: overview for the status bar
//! - `sync_now`: drain the offline queue and wait for the result

use std::sync::Arc;

use serde::Serialize;

use super::StartupSync;
use crate::core_state::CoreState;
use crate::db::repository::format_usage;
use crate::models::{SyncStatus, UserRole};
use crate::sync::SyncOutcome;

/// Status summary for display.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub online: bool,
    pub sync_status: SyncStatus,
    pub role: Option<UserRole>,
    pub report_count: usize,
    pub open_report_count: usize,
    pub offline_queue_count: usize,
    pub tip_count: usize,
    pub storage_usage_bytes: u64,
    pub storage_usage: String,
    pub storage_quota_bytes: Option<u64>,
}

pub fn status(state: &Arc<CoreState>) -> Result<StatusSummary, String> {
    let reports = state.symptoms();
    let usage = state.storage_usage();
    Ok(StatusSummary {
        online: state.is_online(),
        sync_status: state.sync_status(),
        role: state.session().role,
        report_count: reports.len(),
        open_report_count: reports.iter().filter(|r| !r.resolved).count(),
        offline_queue_count: state.offline_queue_count(),
        tip_count: state.tips().len(),
        storage_usage_bytes: usage,
        storage_usage: format_usage(usage),
        storage_quota_bytes: state.config().storage_quota_bytes,
    })
}

/// Run a drain to completion, including the `synced` display window.
///
/// Joins the startup drain when there is one instead of racing it.
pub async fn sync_now(state: &Arc<CoreState>, startup: StartupSync) -> Result<SyncOutcome, String> {
    if !state.is_online() {
        return Err("Cannot sync while offline".into());
    }
    if let Some(handle) = startup {
        let outcome = handle
            .await
            .map_err(|e| format!("Sync task failed: {e}"))?
            .map_err(|e| e.to_string())?;
        if outcome != SyncOutcome::NothingToSync {
            return Ok(outcome);
        }
    }
    state.sync_offline_queue().await.map_err(|e| e.to_string())
}
