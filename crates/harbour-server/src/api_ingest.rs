//! Record submission handlers.
//!
//! Each endpoint builds one record from the request body and hands it to
//! the ingestion pipeline. The response is a short acknowledgement; a
//! record held back by the priority gate is acknowledged too.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json};
use harbour_ingest::{log_debug, EmitOutcome, IngestError, LogParams};
use harbour_types::{ChangeDetail, ChangeInfo};
use serde::Deserialize;
use std::sync::Arc;

/// Request body for `POST /activity-log`.
#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    #[serde(flatten)]
    pub params: LogParams,
    #[serde(default, rename = "msg", alias = "message")]
    pub message: String,
    #[serde(default)]
    pub data: String,
}

/// Request body for `POST /changes-log`.
#[derive(Debug, Deserialize)]
pub struct ChangeRequest {
    #[serde(flatten)]
    pub params: LogParams,
    #[serde(default, rename = "msg", alias = "message")]
    pub message: String,
    pub data: ChangeData,
}

/// Change description with old and new values in any JSON form.
#[derive(Debug, Deserialize)]
pub struct ChangeData {
    pub entity: String,
    pub op: String,
    #[serde(default)]
    pub changes: Vec<ChangeValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeValue {
    pub field: String,
    #[serde(default)]
    pub old_value: serde_json::Value,
    #[serde(default)]
    pub new_value: serde_json::Value,
}

/// Request body for `POST /debug-log`.
#[derive(Debug, Deserialize)]
pub struct DebugRequest {
    #[serde(flatten)]
    pub params: LogParams,
    #[serde(default, rename = "msg", alias = "message")]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl From<ChangeData> for ChangeInfo {
    fn from(data: ChangeData) -> Self {
        let info = ChangeInfo::new(data.entity, data.op);
        data.changes.into_iter().fold(info, |info, c| {
            info.with_change(ChangeDetail::from_json(c.field, &c.old_value, &c.new_value))
        })
    }
}

fn acknowledge(kind: &str, outcome: Result<EmitOutcome, IngestError>) -> Result<String, ApiError> {
    match outcome {
        Ok(EmitOutcome::Published) => Ok(format!("{kind} log posted successfully")),
        Ok(EmitOutcome::Suppressed) => Ok(format!("{kind} log suppressed by priority gate")),
        Ok(EmitOutcome::Diverted(reason)) => Ok(format!(
            "{kind} log written to fallback sink: {reason}"
        )),
        Err(e) => {
            tracing::error!(kind, error = %e, "log record could not be ingested");
            Err(ApiError::InternalServerError(e.to_string()))
        }
    }
}

/// Handler for `POST /activity-log`.
pub async fn post_activity_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ActivityRequest>,
) -> Result<String, ApiError> {
    let outcome = state
        .pipeline
        .log_activity(&request.params, request.message, request.data)
        .await;
    acknowledge("activity", outcome)
}

/// Handler for `POST /changes-log`.
pub async fn post_change_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ChangeRequest>,
) -> Result<String, ApiError> {
    let outcome = state
        .pipeline
        .log_change(&request.params, request.message, request.data.into())
        .await;
    acknowledge("change", outcome)
}

/// Handler for `POST /debug-log`.
pub async fn post_debug_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<DebugRequest>,
) -> Result<String, ApiError> {
    let outcome = log_debug!(state.pipeline, &request.params, request.message, request.data).await;
    acknowledge("debug", outcome)
}
