//! Harbour server library logic.

pub mod api;
pub mod api_admin;
pub mod api_ingest;
pub mod api_logs;
pub mod config;
pub mod indexer;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::{Config, QueryConfig};
use harbour_ingest::{EventBus, FallbackSink, IngestionPipeline, PipelineSettings, PriorityGate};
use harbour_query::{QueryEngine, SearchStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Admission state, mutable through the admin endpoints.
    pub gate: Arc<PriorityGate>,
    /// Ships submitted records to the bus.
    pub pipeline: Arc<IngestionPipeline>,
    /// Answers log queries against the search store.
    pub engine: QueryEngine,
    /// Page size, deadline and aggregation limits.
    pub query: QueryConfig,
}

impl AppState {
    /// Wires the gate, pipeline and query engine from configuration.
    pub fn new(
        config: &Config,
        store: Arc<dyn SearchStore>,
        bus: Arc<dyn EventBus>,
        sink: Arc<FallbackSink>,
    ) -> Self {
        let gate = Arc::new(PriorityGate::new(config.ingest.min_priority));
        gate.set_debug_mode(config.ingest.debug_mode);

        let pipeline = IngestionPipeline::new(
            Arc::clone(&gate),
            bus,
            sink,
            PipelineSettings {
                topic: config.bus.topic.clone(),
                publish_timeout: config.bus.publish_timeout(),
            },
        );
        let engine = QueryEngine::new(store).with_max_records(config.query.max_records);

        Self {
            gate,
            pipeline: Arc::new(pipeline),
            engine,
            query: config.query.clone(),
        }
    }
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/data-changes", get(api_logs::get_data_changes_handler))
        .route("/data-logs", get(api_logs::get_data_logs_handler))
        .route("/getlogs", post(api_logs::get_set_handler))
        .route("/change-logs", get(api_logs::get_change_logs_handler))
        .route("/activity-log", post(api_ingest::post_activity_handler))
        .route("/changes-log", post(api_ingest::post_change_handler))
        .route("/debug-log", post(api_ingest::post_debug_handler))
        .route(
            "/admin/priority",
            get(api_admin::get_priority_handler).put(api_admin::update_priority_handler),
        )
        .route(
            "/admin/debug-mode",
            get(api_admin::get_debug_mode_handler).put(api_admin::update_debug_mode_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
