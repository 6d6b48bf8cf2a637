//! Error types for the ingestion pipeline.

use crate::bus::BusError;

/// Errors returned by [`crate::IngestionPipeline::emit`].
///
/// A bus failure alone is not an error: the record is diverted to the
/// fallback sink and reported through [`crate::EmitOutcome::Diverted`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The record could not be serialized.
    #[error("failed to serialize log record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Neither the bus nor the fallback sink accepted the record.
    #[error("log record {id} lost: {bus}; fallback append failed: {reason}")]
    Lost {
        /// Id of the record that was lost.
        id: String,
        /// Why the bus publish failed.
        bus: BusError,
        /// Why the fallback append failed.
        reason: String,
    },
}
