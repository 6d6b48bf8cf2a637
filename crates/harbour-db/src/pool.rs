//! Pooled SQLite connections backing the log store.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Connection settings for the log database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Upper bound on open connections shared by indexing and queries.
    pub pool_max_size: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type LogPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("could not open log database pool: {0}")]
    Build(#[from] r2d2::Error),
}

/// Opens a pool on the log database at `path`.
///
/// Indexing and queries run concurrently, so every connection is switched
/// to WAL. A `:memory:` path gives each connection a separate empty
/// database; only use it with a single-connection pool.
pub fn open_log_pool(path: &str, settings: StoreSettings) -> Result<LogPool, PoolError> {
    let manager = SqliteConnectionManager::file(path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, settings.busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(path, max_size = settings.pool_max_size, "log database pool ready");
    Ok(pool)
}

fn prepare_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    // "memory" is what an in-memory database reports.
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("log database refused WAL journal mode ({mode})")),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}
