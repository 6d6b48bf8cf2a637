//! Behaviour of the ingestion pipeline against controllable buses.

use async_trait::async_trait;
use harbour_ingest::{
    log_debug, BroadcastBus, BusError, EmitOutcome, EventBus, FallbackSink, IngestError,
    IngestionPipeline, LogParams, PipelineSettings, PriorityGate,
};
use harbour_types::{ChangeDetail, ChangeInfo, LogPayload, LogRecord, LogType, Priority};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the test bus reacts to a publish.
#[derive(Clone, Copy)]
enum Behaviour {
    Accept,
    Reject,
    Hang,
}

struct RecordingBus {
    behaviour: Behaviour,
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingBus {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            published: Mutex::new(Vec::new()),
        })
    }

    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().expect("bus lock").clone()
    }
}

#[async_trait]
impl EventBus for RecordingBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        match self.behaviour {
            Behaviour::Accept => {
                self.published
                    .lock()
                    .expect("bus lock")
                    .push((topic.to_string(), payload.to_string()));
                Ok(())
            }
            Behaviour::Reject => Err(BusError::Unavailable("broker down".to_string())),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }
}

struct Harness {
    pipeline: IngestionPipeline,
    bus: Arc<RecordingBus>,
    sink: Arc<FallbackSink>,
    _dir: tempfile::TempDir,
}

fn harness(behaviour: Behaviour, threshold: Priority) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = Arc::new(FallbackSink::open(dir.path().join("fallback.jsonl")).expect("sink"));
    let bus = RecordingBus::new(behaviour);
    let gate = Arc::new(PriorityGate::new(threshold));
    let pipeline = IngestionPipeline::new(
        gate,
        bus.clone(),
        sink.clone(),
        PipelineSettings {
            topic: "harbour-logs".to_string(),
            publish_timeout: Duration::from_millis(50),
        },
    );
    Harness {
        pipeline,
        bus,
        sink,
        _dir: dir,
    }
}

fn params(priority: Priority) -> LogParams {
    LogParams::new("kra", "linux", "kyc")
        .with_priority(priority)
        .with_who("user2")
        .with_op("insert")
        .with_instance("Customer", "c-1")
}

// ── Gate ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn info_record_under_warn_threshold_is_a_no_op() {
    let h = harness(Behaviour::Accept, Priority::Warn);

    let outcome = h
        .pipeline
        .log_activity(&params(Priority::Info), "viewed", "c-1")
        .await
        .expect("emit should not error");

    assert!(matches!(outcome, EmitOutcome::Suppressed));
    assert!(h.bus.published().is_empty(), "bus should receive nothing");
    assert!(
        h.sink.read_records().expect("read sink").is_empty(),
        "fallback sink should receive nothing"
    );
}

#[tokio::test]
async fn change_records_bypass_the_priority_gate() {
    let h = harness(Behaviour::Accept, Priority::Sec);
    let info = ChangeInfo::new("customer", "update").with_change(ChangeDetail::new("age", 21, 22));

    let outcome = h
        .pipeline
        .log_change(&params(Priority::Debug2), "updated", info)
        .await
        .expect("emit");

    assert!(outcome.is_published());
    assert_eq!(h.bus.published().len(), 1);
}

#[tokio::test]
async fn published_payload_is_the_serialized_record() {
    let h = harness(Behaviour::Accept, Priority::Info);
    let record = params(Priority::Error).activity("failed login", "attempt 3");

    let outcome = h.pipeline.emit(&record).await.expect("emit");
    assert!(outcome.is_published());

    let published = h.bus.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "harbour-logs");
    let decoded: LogRecord = serde_json::from_str(&published[0].1).expect("decode");
    assert_eq!(decoded, record);
}

// ── Debug mode ───────────────────────────────────────────────────────

#[tokio::test]
async fn debug_records_need_debug_mode() {
    let h = harness(Behaviour::Accept, Priority::Debug2);

    let off = log_debug!(h.pipeline, &params(Priority::Debug0), "checkpoint", serde_json::json!({}))
        .await
        .expect("emit");
    assert!(matches!(off, EmitOutcome::Suppressed));
    assert!(h.bus.published().is_empty());

    h.pipeline.gate().set_debug_mode(true);
    let on = log_debug!(h.pipeline, &params(Priority::Debug0), "checkpoint", serde_json::json!({"k": 1}))
        .await
        .expect("emit");
    assert!(on.is_published());

    let published = h.bus.published();
    let decoded: LogRecord = serde_json::from_str(&published[0].1).expect("decode");
    assert_eq!(decoded.log_type(), LogType::Debug);
    match decoded.payload {
        LogPayload::Debug(info) => {
            assert!(info.file_name.ends_with("pipeline.rs"));
            assert_eq!(info.function_name, module_path!());
            assert_eq!(info.data, serde_json::json!({"k": 1}));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn debug_records_still_respect_the_threshold() {
    let h = harness(Behaviour::Accept, Priority::Info);
    h.pipeline.gate().set_debug_mode(true);

    let outcome = log_debug!(h.pipeline, &params(Priority::Debug1), "checkpoint", serde_json::Value::Null)
        .await
        .expect("emit");
    assert!(matches!(outcome, EmitOutcome::Suppressed));
}

// ── Fallback ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bus_timeout_diverts_exactly_one_record_to_the_sink() {
    let h = harness(Behaviour::Hang, Priority::Info);
    let record = params(Priority::Crit).activity("disk full", "volume /data");

    let outcome = h.pipeline.emit(&record).await.expect("emit is non-fatal");

    assert!(matches!(outcome, EmitOutcome::Diverted(BusError::Timeout(_))));
    let spooled = h.sink.read_records().expect("read sink");
    assert_eq!(spooled, vec![record]);
}

#[tokio::test]
async fn bus_rejection_diverts_to_the_sink() {
    let h = harness(Behaviour::Reject, Priority::Info);
    let record = params(Priority::Warn).activity("quota", "90%");

    let outcome = h.pipeline.emit(&record).await.expect("emit is non-fatal");

    assert!(matches!(outcome, EmitOutcome::Diverted(BusError::Unavailable(_))));
    assert_eq!(h.sink.read_records().expect("read sink"), vec![record]);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn record_is_lost_only_when_the_sink_also_fails() {
    // Every write to /dev/full fails with ENOSPC.
    let sink = Arc::new(FallbackSink::open("/dev/full").expect("open /dev/full"));
    let pipeline = IngestionPipeline::new(
        Arc::new(PriorityGate::new(Priority::Info)),
        RecordingBus::new(Behaviour::Reject),
        sink,
        PipelineSettings {
            topic: "harbour-logs".to_string(),
            publish_timeout: Duration::from_millis(50),
        },
    );

    let record = params(Priority::Crit).activity("x", "y");
    let err = pipeline.emit(&record).await.expect_err("record should be lost");
    match err {
        IngestError::Lost { id, bus, .. } => {
            assert_eq!(id, record.id);
            assert!(matches!(bus, BusError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn broadcast_bus_without_subscribers_diverts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = Arc::new(FallbackSink::open(dir.path().join("fallback.jsonl")).expect("sink"));
    let bus = Arc::new(BroadcastBus::new(8));
    let pipeline = IngestionPipeline::new(
        Arc::new(PriorityGate::new(Priority::Info)),
        bus.clone(),
        sink.clone(),
        PipelineSettings {
            topic: "harbour-logs".to_string(),
            publish_timeout: Duration::from_millis(50),
        },
    );

    let record = params(Priority::Sec).activity("intrusion", "ssh");
    let outcome = pipeline.emit(&record).await.expect("emit");
    assert!(matches!(outcome, EmitOutcome::Diverted(BusError::NoSubscribers(_))));
    assert_eq!(sink.read_records().expect("read").len(), 1);

    let mut rx = bus.subscribe("harbour-logs");
    let outcome = pipeline.emit(&record).await.expect("emit");
    assert!(outcome.is_published());
    let line = rx.recv().await.expect("message");
    let decoded: LogRecord = serde_json::from_str(&line).expect("decode");
    assert_eq!(decoded.id, record.id);
}
