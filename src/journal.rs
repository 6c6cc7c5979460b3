//! Health log export and restore format.
//!
//! A log is a pretty-printed JSON array of symptom reports, named
//! `health_log_<YYYY-MM-DD>.json`. Restore accepts a file only when it is an
//! array whose every element is an object carrying both `id` and `symptoms`;
//! anything else is rejected whole.

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::models::SymptomReport;

/// Keys every restored entry must carry.
pub const REQUIRED_FIELDS: [&str; 2] = ["id", "symptoms"];

/// Restore/export failures. Display strings are shown to the user as-is.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Could not access the health log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format. Please upload a valid health log JSON file.")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid file format. A health log must be a list of reports.")]
    NotAnArray,

    #[error("Invalid file format. Report #{} is missing \"{field}\".", .index + 1)]
    MissingField { index: usize, field: &'static str },

    #[error("Invalid file format. Report #{} could not be read: {reason}", .index + 1)]
    InvalidEntry { index: usize, reason: String },

    #[error("Could not write the health log: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// `health_log_2026-10-18.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("health_log_{}.json", date.format("%Y-%m-%d"))
}

/// Pretty-printed JSON array of the given reports.
pub fn serialize_log(reports: &[SymptomReport]) -> Result<String, LogError> {
    serde_json::to_string_pretty(reports).map_err(LogError::Serialize)
}

/// Validate and decode a restore file. No partial result on failure.
pub fn parse_log(text: &str) -> Result<Vec<SymptomReport>, LogError> {
    let value: Value = serde_json::from_str(text).map_err(LogError::InvalidJson)?;
    let entries = value.as_array().ok_or(LogError::NotAnArray)?;

    for (index, entry) in entries.iter().enumerate() {
        let object = entry.as_object().ok_or_else(|| LogError::InvalidEntry {
            index,
            reason: "entry is not an object".into(),
        })?;
        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(LogError::MissingField { index, field });
            }
        }
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value::<SymptomReport>(entry.clone()).map_err(|e| {
                LogError::InvalidEntry {
                    index,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}
