//! SQLite persistence for indexed log records.
//!
//! Provides connection pooling (via `r2d2`) in WAL mode, embedded SQL
//! migrations, and [`SqliteStore`], the [`harbour_query::SearchStore`]
//! implementation the server runs against.
//!
//! # Design decisions
//!
//! - **Sortable timestamps**: `when` is stored as fixed-width RFC 3339 text
//!   with microseconds, so range filters and ordering are plain string
//!   comparisons on an indexed column.
//! - **Priority rank column**: the numeric rank sits next to the label so a
//!   priority floor is a single `>=` comparison.
//! - **Full document**: the serialized record is stored alongside the
//!   columns and returned as-is, so reads never reassemble payloads.
//! - **Embedded migrations**: SQL files are compiled in with `include_str!`.

mod migrations;
mod pool;
mod store;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{open_log_pool, LogPool, PoolError, StoreSettings};
pub use store::{OpenError, SqliteStore};
