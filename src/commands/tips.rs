//! Safety tip commands. Edits require the health worker role.

use std::sync::Arc;

use serde::Serialize;

use crate::core_state::CoreState;
use crate::models::{Tip, TipDraft};

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub deleted: String,
}

pub fn list_tips(state: &Arc<CoreState>) -> Vec<Tip> {
    state.tips()
}

pub fn add_tip(
    state: &Arc<CoreState>,
    icon: String,
    title: String,
    description: String,
    steps: Vec<String>,
) -> Result<Tip, String> {
    let draft = TipDraft {
        icon,
        title: title.trim().to_string(),
        description,
        steps,
    };
    state.add_tip(draft).map_err(|e| e.to_string())
}

pub fn delete_tip(state: &Arc<CoreState>, id: &str) -> Result<DeleteResult, String> {
    if id.trim().is_empty() {
        return Err("Tip ID is required".into());
    }
    state.delete_tip(id).map_err(|e| e.to_string())?;
    Ok(DeleteResult {
        deleted: id.to_string(),
    })
}
