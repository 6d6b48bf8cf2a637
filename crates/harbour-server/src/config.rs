//! Server configuration loading from file and environment variables.

use harbour_types::Priority;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Admission gate and fallback sink settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Query limits.
    #[serde(default)]
    pub query: QueryConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "harbour_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Topic log records are published under.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Per-subscriber buffer of the in-process bus.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,

    /// How long a publish may take before the record is diverted.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// File that receives records the bus could not take.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Initial admission threshold.
    #[serde(default = "default_min_priority")]
    pub min_priority: Priority,

    /// Initial debug mode.
    #[serde(default)]
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Records per page on `/data-logs`.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Cap on records returned by one store query.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Deadline for a single query, in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Default bucket count for top-value aggregations.
    #[serde(default = "default_terms_size")]
    pub terms_size: usize,
}

impl BusConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl QueryConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "harbour.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_topic() -> String {
    "harbour-logs".to_string()
}

fn default_bus_capacity() -> usize {
    1_024
}

fn default_publish_timeout_ms() -> u64 {
    2_000
}

fn default_fallback_path() -> String {
    "harbour-fallback.jsonl".to_string()
}

fn default_min_priority() -> Priority {
    Priority::Info
}

fn default_page_size() -> usize {
    50
}

fn default_max_records() -> usize {
    harbour_query::DEFAULT_MAX_RECORDS
}

fn default_deadline_ms() -> u64 {
    10_000
}

fn default_terms_size() -> usize {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            capacity: default_bus_capacity(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fallback_path: default_fallback_path(),
            min_priority: default_min_priority(),
            debug_mode: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_records: default_max_records(),
            deadline_ms: default_deadline_ms(),
            terms_size: default_terms_size(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `HARBOUR_HOST`, `HARBOUR_PORT` override `server.*`
/// - `HARBOUR_DB_PATH` overrides `database.path`
/// - `HARBOUR_LOG_LEVEL` overrides `logging.level`
/// - `HARBOUR_LOG_JSON` overrides `logging.json` ("true" or "1" to enable)
/// - `HARBOUR_TOPIC` overrides `bus.topic`
/// - `HARBOUR_FALLBACK_PATH` overrides `ingest.fallback_path`
/// - `HARBOUR_MIN_PRIORITY` overrides `ingest.min_priority`
/// - `HARBOUR_DEBUG_MODE` overrides `ingest.debug_mode`
///
/// Unparsable override values are ignored.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("HARBOUR_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = host;
    }
    if let Some(port) = var("HARBOUR_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = port;
    }
    if let Some(db_path) = var("HARBOUR_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("HARBOUR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("HARBOUR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(topic) = var("HARBOUR_TOPIC") {
        config.bus.topic = topic;
    }
    if let Some(path) = var("HARBOUR_FALLBACK_PATH") {
        config.ingest.fallback_path = path;
    }
    if let Some(priority) = var("HARBOUR_MIN_PRIORITY").and_then(|v| v.parse().ok()) {
        config.ingest.min_priority = priority;
    }
    if let Some(debug) = var("HARBOUR_DEBUG_MODE") {
        config.ingest.debug_mode = debug == "true" || debug == "1";
    }
}
