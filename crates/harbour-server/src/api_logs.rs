//! Log query API handlers.
//!
//! Provides:
//! - `GET /data-changes`: change records for one object instance
//! - `GET /data-logs`: filtered, paginated records of any type
//! - `POST /getlogs`: value frequencies of one attribute
//! - `GET /change-logs`: change records, 404 when none match

use crate::api::{require, require_token, ApiError};
use crate::AppState;
use axum::extract::{Extension, Json, Query};
use harbour_query::{Aggregation, Aggregator, FilterRequest, FilterSpec};
use harbour_types::{to_sortable, LogRecord, LogType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Response body for `GET /data-logs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataLogsResponse {
    /// One page of matching records.
    pub logs: Vec<LogRecord>,
    /// Number of records matching the filter, before paging.
    pub nrec: u64,
    /// Empty on success.
    pub err: String,
    #[serde(rename = "nextSearchAfterTs", skip_serializing_if = "Option::is_none")]
    pub next_search_after_ts: Option<String>,
    #[serde(rename = "nextSearchAfterDocID", skip_serializing_if = "Option::is_none")]
    pub next_search_after_doc_id: Option<String>,
}

/// Request body for `POST /getlogs`.
#[derive(Debug, Deserialize)]
pub struct SetRequest {
    #[serde(flatten)]
    pub filter: FilterRequest,
    /// Attribute whose values are counted.
    #[serde(rename = "setAttr", alias = "setattr")]
    pub set_attr: Option<String>,
    /// When given, only the `size` most frequent values are returned.
    pub size: Option<usize>,
}

/// Validates a change-record request and pins it to change records.
fn change_spec(request: FilterRequest) -> Result<FilterSpec, ApiError> {
    require_token(&request)?;
    require("app", &request.app)?;
    require("className", &request.class_name)?;
    require("instance", &request.instance)?;

    let mut spec = request.into_spec()?;
    spec.log_type = Some(LogType::Change);
    spec.priority_floor = None;
    Ok(spec)
}

/// Handler for `GET /data-changes`.
pub async fn get_data_changes_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(request): Query<FilterRequest>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let spec = change_spec(request)?;
    let result = state
        .engine
        .query_within(spec, state.query.deadline())
        .await?;
    Ok(Json(result.records))
}

/// Handler for `GET /data-logs`.
pub async fn get_data_logs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(request): Query<FilterRequest>,
) -> Result<Json<DataLogsResponse>, ApiError> {
    require_token(&request)?;
    let spec = request.into_spec()?;
    let cursor = spec.cursor.clone();

    let (result, nrec) = state
        .engine
        .within(state.query.deadline(), move |engine| {
            Ok((engine.query(&spec)?, engine.count(&spec)?))
        })
        .await?;
    let page = result.page(cursor.as_ref(), state.query.page_size);

    tracing::debug!(nrec, returned = page.records.len(), "served data-logs page");

    Ok(Json(DataLogsResponse {
        logs: page.records,
        nrec,
        err: String::new(),
        next_search_after_ts: page.next_cursor.as_ref().map(|c| to_sortable(&c.when)),
        next_search_after_doc_id: page.next_cursor.map(|c| c.id),
    }))
}

/// Handler for `POST /getlogs`.
pub async fn get_set_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SetRequest>,
) -> Result<Json<BTreeMap<String, u64>>, ApiError> {
    require_token(&request.filter)?;
    require("setAttr", &request.set_attr)?;
    let attribute = request.set_attr.unwrap_or_default();
    let spec = request.filter.into_spec()?;

    let counts = match request.size {
        Some(size) => {
            let size = if size == 0 { state.query.terms_size } else { size };
            let buckets = state
                .engine
                .within(state.query.deadline(), move |engine| {
                    Aggregator::new(engine.clone()).top_values(&spec, &attribute, size)
                })
                .await?;
            buckets.into_iter().map(|b| (b.value, b.count)).collect()
        }
        None => {
            let aggregation = state
                .engine
                .within(state.query.deadline(), move |engine| {
                    Aggregator::new(engine.clone()).aggregate(&spec, &attribute)
                })
                .await?;
            match aggregation {
                Aggregation::Counts(counts) => counts,
                Aggregation::NotFound => BTreeMap::new(),
            }
        }
    };

    if counts.is_empty() {
        return Err(ApiError::NotFound("no log records match the filter".to_string()));
    }
    Ok(Json(counts))
}

/// Handler for `GET /change-logs`.
pub async fn get_change_logs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(request): Query<FilterRequest>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let spec = change_spec(request)?;
    let cursor = spec.cursor.clone();

    let result = state
        .engine
        .query_within(spec, state.query.deadline())
        .await?;
    let page = result.page(cursor.as_ref(), usize::MAX);

    if page.records.is_empty() {
        return Err(ApiError::NotFound("no change records found".to_string()));
    }
    Ok(Json(page.records))
}
