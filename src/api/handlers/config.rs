use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::AppState;

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// Effective runtime settings, persisted overrides applied.
pub async fn get_config(State(state): State<AppState>) -> Json<Vec<ConfigEntry>> {
    let entries = state
        .settings
        .current()
        .to_entries()
        .into_iter()
        .map(|(key, value)| ConfigEntry { key, value })
        .collect();

    Json(entries)
}

#[derive(Deserialize)]
pub struct UpdateConfigRequest {
    pub entries: HashMap<String, String>,
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(body): Json<UpdateConfigRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = body.entries.len();
    let applied = state
        .settings
        .update(state.store.as_ref(), body.entries)
        .await?;

    tracing::info!(updated, "Runtime config updated via API");
    Ok(Json(serde_json::json!({
        "success": true,
        "updated": updated,
        "settings": applied,
    })))
}
