//! Static defaults shown on first run, before anything has been persisted.

use crate::models::{SymptomReport, Tip};

/// Initial collections handed to the state container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedData {
    pub reports: Vec<SymptomReport>,
    pub tips: Vec<Tip>,
}

impl SeedData {
    /// Nothing seeded; a fresh store starts empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Demo reports and the baseline safety guides.
    pub fn defaults() -> Self {
        Self {
            reports: default_reports(),
            tips: default_tips(),
        }
    }
}

fn report(id: i64, village: &str, symptoms: &str, reported_at: &str, resolved: bool) -> SymptomReport {
    SymptomReport {
        id,
        village: village.into(),
        symptoms: symptoms.into(),
        symptoms_en: symptoms.into(),
        notes: None,
        notes_en: None,
        photo: None,
        reported_at: reported_at.into(),
        resolved,
    }
}

pub fn default_reports() -> Vec<SymptomReport> {
    vec![
        report(3, "Ziro", "Diarrhoea and stomach cramps", "2 hours ago", false),
        report(2, "Pasighat", "Fever and vomiting", "Yesterday", false),
        report(1, "Tezu", "Skin rash after bathing in stream", "3 days ago", true),
    ]
}

fn tip(id: &str, icon: &str, title: &str, description: &str, steps: &[&str]) -> Tip {
    Tip {
        id: id.into(),
        icon: icon.into(),
        title: title.into(),
        description: description.into(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn default_tips() -> Vec<Tip> {
    vec![
        tip(
            "boil-water",
            "flame",
            "Boil drinking water",
            "Boiling kills most germs that cause diarrhoea and cholera.",
            &[
                "Bring water to a rolling boil",
                "Keep it boiling for at least one minute",
                "Cool it in a clean, covered pot",
            ],
        ),
        tip(
            "store-safely",
            "jar",
            "Store water safely",
            "Clean water gets dirty again in open or shared containers.",
            &[
                "Use a container with a narrow mouth and a lid",
                "Pour water out instead of dipping cups in",
                "Wash the container every week",
            ],
        ),
        tip(
            "ors",
            "droplet",
            "Make oral rehydration solution",
            "ORS replaces the water and salts lost through diarrhoea.",
            &[
                "Mix six level teaspoons of sugar in one litre of boiled water",
                "Add half a level teaspoon of salt",
                "Give small sips often until diarrhoea stops",
            ],
        ),
    ]
}
