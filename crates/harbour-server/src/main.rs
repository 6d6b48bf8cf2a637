//! Harbour server binary.
//!
//! Opens the log store, replays the fallback sink, starts the indexer, and
//! serves the HTTP API with graceful shutdown on SIGTERM/SIGINT.

use harbour_db::{SqliteStore, StoreSettings};
use harbour_ingest::{BroadcastBus, FallbackSink};
use harbour_query::SearchStore;
use harbour_server::config::{self, Config};
use harbour_server::{app, indexer, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Fatal startup failures.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to open log store: {0}")]
    Store(#[from] harbour_db::OpenError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("HARBOUR_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Tracing may not be initialised yet.
        eprintln!("harbour server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("harbour.toml"));

    let config = config::load_config(selected_config_path)?;
    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let store = SqliteStore::open(
        &config.database.path,
        StoreSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )?;
    let store: Arc<dyn SearchStore> = Arc::new(store);

    let sink = Arc::new(FallbackSink::open(&config.ingest.fallback_path)?);
    match indexer::replay_fallback(&sink, store.as_ref()) {
        Ok(0) => {}
        Ok(replayed) => tracing::info!(count = replayed, "recovered records from fallback sink"),
        Err(e) => tracing::error!(
            path = %sink.path().display(),
            error = %e,
            "fallback replay failed, records stay in the sink"
        ),
    }

    let bus = Arc::new(BroadcastBus::new(config.bus.capacity));
    let rx = bus.subscribe(&config.bus.topic);
    tokio::spawn(indexer::run_indexer(rx, Arc::clone(&store)));

    let state = AppState::new(&config, store, bus, sink);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, topic = %config.bus.topic, "starting harbour server");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("harbour server shut down");
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
