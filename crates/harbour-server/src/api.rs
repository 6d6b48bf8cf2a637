//! Shared API error type and request helpers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use harbour_query::{FilterRequest, QueryError};
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("deadline exceeded: {0}")]
    GatewayTimeout(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({
                    "status": "failure",
                    "statusCode": "not-found",
                    "message": msg,
                }),
            ),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, error_body(msg)),
            ApiError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error_body(msg))
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            e if e.is_client_error() => ApiError::BadRequest(e.to_string()),
            QueryError::DeadlineExceeded(_) => ApiError::GatewayTimeout(e.to_string()),
            e => {
                tracing::error!(error = %e, "log query failed");
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

/// Rejects a request without a non-blank `queryToken`.
pub fn require_token(request: &FilterRequest) -> Result<(), ApiError> {
    request
        .token()
        .map(|_| ())
        .ok_or_else(|| ApiError::BadRequest("queryToken is required".to_string()))
}

/// Rejects a request where a mandatory parameter is missing or blank.
pub fn require(name: &str, value: &Option<String>) -> Result<(), ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest(format!("{name} is required"))),
    }
}
