//! Log admission and transport.
//!
//! Producers describe who is logging with [`LogParams`], build records, and
//! hand them to an [`IngestionPipeline`]. The pipeline consults the shared
//! [`PriorityGate`], publishes admitted records to the [`EventBus`] as JSON,
//! and appends them to a [`FallbackSink`] when the bus fails or times out.
//!
//! # Usage
//!
//! ```rust,ignore
//! use harbour_ingest::{log_debug, LogParams};
//!
//! let params = LogParams::new("kra", "linux", "kyc").with_who("user2");
//! pipeline.log_activity(&params, "profile viewed", "c-17").await?;
//! log_debug!(pipeline, &params, "cache miss", serde_json::json!({ "key": "c-17" })).await?;
//! ```

mod bus;
mod error;
mod gate;
mod params;
mod pipeline;
mod sink;

pub use bus::{BroadcastBus, BusError, EventBus};
pub use error::IngestError;
pub use gate::PriorityGate;
pub use params::{CallSite, LogParams};
pub use pipeline::{EmitOutcome, IngestionPipeline, PipelineSettings};
pub use sink::{FallbackSink, Recovery};

/// Emits a debug record stamped with the caller's file, line and module.
///
/// Expands to a call to [`IngestionPipeline::log_debug`]; the returned
/// future must be awaited. Nothing is captured when debug mode is off.
#[macro_export]
macro_rules! log_debug {
    ($pipeline:expr, $params:expr, $message:expr, $data:expr $(,)?) => {
        $pipeline.log_debug(
            $params,
            $crate::CallSite {
                file: file!(),
                line: line!(),
                function: module_path!(),
            },
            $message,
            $data,
        )
    };
}
