//! Background tasks that move records into the search store.
//!
//! Includes:
//! - The indexer, which consumes the bus topic.
//! - Replay of records left in the fallback sink by a previous run.

use harbour_ingest::{FallbackSink, Recovery};
use harbour_query::SearchStore;
use harbour_types::LogRecord;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Indexes every record published on `rx` until the bus closes.
///
/// Malformed messages and store failures are logged and skipped.
pub async fn run_indexer(mut rx: broadcast::Receiver<String>, store: Arc<dyn SearchStore>) {
    tracing::info!("starting log indexer");

    loop {
        let line = match rx.recv().await {
            Ok(line) => line,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "log indexer lagged behind the bus, messages dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let record: LogRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "discarding malformed bus message");
                continue;
            }
        };

        let store = Arc::clone(&store);
        let id = record.id.clone();
        match tokio::task::spawn_blocking(move || store.index(&record)).await {
            Ok(Ok(())) => tracing::trace!(%id, "indexed log record"),
            Ok(Err(e)) => tracing::error!(%id, error = %e, "failed to index log record"),
            Err(e) => tracing::error!(%id, "indexer task join error: {}", e),
        }
    }

    tracing::info!("bus closed, log indexer stopped");
}

/// Moves every record in `sink` into `store` and returns how many were
/// indexed.
///
/// Records the store rejects stay in the sink for the next replay and
/// unreadable lines are quarantined. Indexing is idempotent by id.
pub fn replay_fallback(sink: &FallbackSink, store: &dyn SearchStore) -> std::io::Result<usize> {
    let recovery = sink.recover(|record| store.index(record))?;
    if recovery == Recovery::default() {
        return Ok(0);
    }

    tracing::info!(
        indexed = recovery.recovered,
        kept = recovery.kept,
        quarantined = recovery.quarantined,
        path = %sink.path().display(),
        "replayed fallback sink into the log store"
    );
    Ok(recovery.recovered)
}
