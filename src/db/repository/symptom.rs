use crate::config::REPORTS_KEY;
use crate::db::StorageError;
use crate::models::SymptomReport;
use crate::persistence::Persistence;

/// Durable record of every symptom report, resolved or not.
#[derive(Clone)]
pub struct ReportStore {
    persistence: Persistence,
}

impl ReportStore {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    /// The persisted collection, or `seed` if nothing has been persisted yet
    /// (or what is there cannot be read).
    pub fn get_stored_reports(&self, seed: &[SymptomReport]) -> Vec<SymptomReport> {
        self.persistence.load(REPORTS_KEY, seed.to_vec())
    }

    /// Replace the whole collection. Best-effort; returns whether it landed.
    pub fn save_reports(&self, reports: &[SymptomReport]) -> bool {
        self.persistence.save(REPORTS_KEY, reports)
    }

    /// Replace the whole collection, surfacing any storage failure.
    pub fn try_save_reports(&self, reports: &[SymptomReport]) -> Result<(), StorageError> {
        self.persistence.try_save(REPORTS_KEY, reports)
    }
}
