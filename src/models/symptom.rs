use serde::{Deserialize, Serialize};

/// Relative timestamp stamped on every new report. Never recomputed.
pub const JUST_NOW: &str = "Just now";

fn default_reported_at() -> String {
    JUST_NOW.to_string()
}

/// A villager's self-reported health event.
///
/// Field names serialize in camelCase so persisted collections and exported
/// logs stay readable by the browser client. Only `id` and `symptoms` are
/// required when deserializing; everything else falls back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomReport {
    pub id: i64,
    #[serde(default)]
    pub village: String,
    pub symptoms: String,
    #[serde(default)]
    pub symptoms_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_en: Option<String>,
    /// Embedded image (data URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default = "default_reported_at")]
    pub reported_at: String,
    #[serde(default)]
    pub resolved: bool,
}

/// Input for a new report, as captured by the reporting form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSymptomReport {
    pub village: String,
    pub symptoms: String,
    #[serde(default)]
    pub symptoms_en: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub notes_en: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl NewSymptomReport {
    pub fn new(village: impl Into<String>, symptoms: impl Into<String>) -> Self {
        Self {
            village: village.into(),
            symptoms: symptoms.into(),
            ..Default::default()
        }
    }

    /// Stamp the input with its id. English text falls back to the original
    /// when no translation was supplied.
    pub fn into_report(self, id: i64) -> SymptomReport {
        let symptoms_en = self
            .symptoms_en
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.symptoms.clone());
        let notes_en = self
            .notes_en
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.notes.clone());

        SymptomReport {
            id,
            village: self.village,
            symptoms: self.symptoms,
            symptoms_en,
            notes: self.notes,
            notes_en,
            photo: self.photo,
            reported_at: default_reported_at(),
            resolved: false,
        }
    }
}
