//! Runtime control of the admission gate.
//!
//! Provides:
//! - `GET|PUT /admin/priority`: minimum priority admitted
//! - `GET|PUT /admin/debug-mode`: whether debug records are admitted

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json};
use harbour_types::Priority;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityResponse {
    pub min_priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityUpdate {
    pub min_priority: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugMode {
    pub debug_mode: bool,
}

/// Handler for `GET /admin/priority`.
pub async fn get_priority_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<PriorityResponse> {
    Json(PriorityResponse {
        min_priority: state.gate.min_priority().to_string(),
        previous: None,
    })
}

/// Handler for `PUT /admin/priority`.
///
/// Unlike record priorities, an unrecognised label here is rejected rather
/// than read as `UNKNOWN`.
pub async fn update_priority_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(update): Json<PriorityUpdate>,
) -> Result<Json<PriorityResponse>, ApiError> {
    let priority: Priority = update
        .min_priority
        .parse()
        .map_err(|e: harbour_types::ParseLevelError| ApiError::BadRequest(e.to_string()))?;

    let previous = state.gate.set_min_priority(priority);
    Ok(Json(PriorityResponse {
        min_priority: priority.to_string(),
        previous: Some(previous.to_string()),
    }))
}

/// Handler for `GET /admin/debug-mode`.
pub async fn get_debug_mode_handler(Extension(state): Extension<Arc<AppState>>) -> Json<DebugMode> {
    Json(DebugMode {
        debug_mode: state.gate.is_debug_mode(),
    })
}

/// Handler for `PUT /admin/debug-mode`.
pub async fn update_debug_mode_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(update): Json<DebugMode>,
) -> Json<DebugMode> {
    state.gate.set_debug_mode(update.debug_mode);
    Json(DebugMode {
        debug_mode: state.gate.is_debug_mode(),
    })
}
