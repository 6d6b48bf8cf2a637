//! Error types for the query layer.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Errors reported by a [`crate::SearchStore`] implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backing database rejected or failed a statement.
    #[error("database error: {0}")]
    Database(String),

    /// No connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A blocking store task panicked or was cancelled.
    #[error("task join error: {0}")]
    Task(String),
}

/// Errors that can occur while answering a log query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A parameter is missing, malformed, or not recognised.
    #[error("invalid query: {0}")]
    Validation(String),

    /// `fromTs` is after `toTs`.
    #[error("invalid time range: fromTs {from} is after toTs {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    /// The attribute is continuous or unknown and cannot be aggregated.
    #[error("attribute '{0}' cannot be aggregated")]
    UnsupportedAttribute(String),

    /// The caller's deadline passed before the store answered.
    #[error("query did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// The search store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidRange { .. } | Self::UnsupportedAttribute(_)
        )
    }
}
