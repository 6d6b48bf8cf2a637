//! Gate, serialize, publish, fall back.

use std::sync::Arc;
use std::time::Duration;

use harbour_types::{ChangeInfo, LogRecord, LogType, Priority};

use crate::bus::{BusError, EventBus};
use crate::error::IngestError;
use crate::gate::PriorityGate;
use crate::params::{CallSite, LogParams};
use crate::sink::FallbackSink;

/// What happened to an emitted record.
#[derive(Debug)]
pub enum EmitOutcome {
    /// The gate rejected the record. Nothing was published or written.
    Suppressed,
    /// The bus accepted the record.
    Published,
    /// The bus failed; the record was appended to the fallback sink.
    Diverted(BusError),
}

impl EmitOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Bus topic and publish deadline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub topic: String,
    pub publish_timeout: Duration,
}

/// Ships admitted records to the event bus, falling back to a local sink.
///
/// At-least-once and best effort: a record that passes the gate is either
/// published, appended to the sink, or reported as [`IngestError::Lost`].
/// There are no internal retries.
pub struct IngestionPipeline {
    gate: Arc<PriorityGate>,
    bus: Arc<dyn EventBus>,
    sink: Arc<FallbackSink>,
    settings: PipelineSettings,
}

impl IngestionPipeline {
    pub fn new(
        gate: Arc<PriorityGate>,
        bus: Arc<dyn EventBus>,
        sink: Arc<FallbackSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            gate,
            bus,
            sink,
            settings,
        }
    }

    pub fn gate(&self) -> &Arc<PriorityGate> {
        &self.gate
    }

    pub fn sink(&self) -> &Arc<FallbackSink> {
        &self.sink
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    /// Whether the gate lets `record` through. Change records bypass the
    /// priority check; debug records also need debug mode.
    pub fn admits(&self, record: &LogRecord) -> bool {
        let priority = record.priority.unwrap_or(Priority::Unknown);
        match record.log_type() {
            LogType::Change => true,
            LogType::Activity => self.gate.should_admit(priority),
            LogType::Debug => self.gate.is_debug_mode() && self.gate.should_admit(priority),
        }
    }

    /// Emits one record.
    ///
    /// The publish is bounded by the configured timeout. On failure the
    /// serialized record is appended to the fallback sink on a blocking
    /// task, which runs to completion even if this future is dropped.
    pub async fn emit(&self, record: &LogRecord) -> Result<EmitOutcome, IngestError> {
        if !self.admits(record) {
            tracing::debug!(
                id = %record.id,
                log_type = %record.log_type(),
                "log record suppressed by priority gate"
            );
            return Ok(EmitOutcome::Suppressed);
        }

        let line = serde_json::to_string(record)?;

        let publish = self.bus.publish(&self.settings.topic, &line);
        let failure = match tokio::time::timeout(self.settings.publish_timeout, publish).await {
            Ok(Ok(())) => return Ok(EmitOutcome::Published),
            Ok(Err(e)) => e,
            Err(_) => BusError::Timeout(self.settings.publish_timeout),
        };

        tracing::warn!(
            id = %record.id,
            topic = %self.settings.topic,
            error = %failure,
            "bus publish failed, writing log record to fallback sink"
        );

        let sink = Arc::clone(&self.sink);
        let appended = tokio::task::spawn_blocking(move || sink.append(&line)).await;
        let reason = match appended {
            Ok(Ok(())) => return Ok(EmitOutcome::Diverted(failure)),
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("fallback task failed: {e}"),
        };

        tracing::error!(id = %record.id, %reason, "fallback sink append failed");
        Err(IngestError::Lost {
            id: record.id.clone(),
            bus: failure,
            reason,
        })
    }

    /// Builds and emits an activity record.
    pub async fn log_activity(
        &self,
        params: &LogParams,
        message: impl Into<String>,
        data: impl Into<String>,
    ) -> Result<EmitOutcome, IngestError> {
        self.emit(&params.activity(message, data)).await
    }

    /// Builds and emits a change record.
    pub async fn log_change(
        &self,
        params: &LogParams,
        message: impl Into<String>,
        info: ChangeInfo,
    ) -> Result<EmitOutcome, IngestError> {
        self.emit(&params.change(message, info)).await
    }

    /// Builds and emits a debug record.
    ///
    /// The gate is consulted before the stack trace is captured, so disabled
    /// debug logging costs one atomic load. Prefer the [`crate::log_debug!`]
    /// macro, which fills in `site`.
    pub async fn log_debug(
        &self,
        params: &LogParams,
        site: CallSite,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<EmitOutcome, IngestError> {
        if !self.gate.is_debug_mode() || !self.gate.should_admit(params.priority) {
            return Ok(EmitOutcome::Suppressed);
        }
        self.emit(&params.debug(message, site, data)).await
    }
}
