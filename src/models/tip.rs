use serde::{Deserialize, Serialize};

/// A safety guide written by a health worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub id: String,
    pub icon: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Editable fields of a tip; the id is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipDraft {
    pub icon: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl TipDraft {
    pub fn into_tip(self, id: impl Into<String>) -> Tip {
        Tip {
            id: id.into(),
            icon: self.icon,
            title: self.title,
            description: self.description,
            steps: self.steps,
        }
    }
}
