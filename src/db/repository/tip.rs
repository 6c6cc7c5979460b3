use crate::config::TIPS_KEY;
use crate::models::Tip;
use crate::persistence::Persistence;

/// Durable collection of health-worker safety tips.
#[derive(Clone)]
pub struct TipStore {
    persistence: Persistence,
}

impl TipStore {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    pub fn get_tips(&self, seed: &[Tip]) -> Vec<Tip> {
        self.persistence.load(TIPS_KEY, seed.to_vec())
    }

    /// Replace the whole collection; there are no partial patches.
    pub fn save_tips(&self, tips: &[Tip]) -> bool {
        self.persistence.save(TIPS_KEY, tips)
    }
}
