//! Health log commands.
//!
//! - `report_symptom`: record a report (stored online, queued offline)
//! - `resolve_symptom`: mark a report resolved
//! - `export_log` / `restore_log`: health log file round trip
//! - `clear_log`: wipe reports and queue

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::core_state::{CoreState, ReportReceipt};
use crate::models::{NewSymptomReport, SymptomReport};

/// Form fields for a new report.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub village: String,
    pub symptoms: String,
    pub symptoms_en: Option<String>,
    pub notes: Option<String>,
    pub notes_en: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub path: PathBuf,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub restored: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub cleared: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub fn report_symptom(state: &Arc<CoreState>, input: ReportInput) -> Result<ReportReceipt, String> {
    let data = NewSymptomReport {
        village: input.village.trim().to_string(),
        symptoms: input.symptoms.trim().to_string(),
        symptoms_en: non_blank(input.symptoms_en),
        notes: non_blank(input.notes),
        notes_en: non_blank(input.notes_en),
        photo: None,
    };
    state.report_symptom(data).map_err(|e| e.to_string())
}

pub fn resolve_symptom(state: &Arc<CoreState>, id: i64) -> Result<SymptomReport, String> {
    state.resolve_symptom(id).map_err(|e| e.to_string())
}

/// Exports to `dir`, or to the data directory's `exports/` folder.
pub fn export_log(state: &Arc<CoreState>, dir: Option<PathBuf>) -> Result<ExportResult, String> {
    let dir = dir.unwrap_or_else(|| state.exports_dir());
    let path = state.export_log(&dir).map_err(|e| e.to_string())?;
    Ok(ExportResult {
        path,
        count: state.symptoms().len(),
    })
}

pub async fn restore_log(state: &Arc<CoreState>, file: &Path) -> Result<RestoreResult, String> {
    let restored = state.restore_log(file).await.map_err(|e| e.to_string())?;
    Ok(RestoreResult { restored })
}

pub fn clear_log(state: &Arc<CoreState>) -> Result<ClearResult, String> {
    state.clear_log().map_err(|e| e.to_string())?;
    Ok(ClearResult { cleared: true })
}
