//! SQLite-backed [`SearchStore`].
//!
//! Each record becomes one row of `log_entries`: the attributes that can be
//! filtered or aggregated get their own columns and the full record is kept
//! as JSON in `doc`. Queries are built from [`StoreQuery`] with bound
//! parameters only; column names come from a fixed match on [`LogField`].

use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use harbour_query::{SearchStore, SortOrder, StoreError, StoreQuery, TermCount};
use harbour_types::{to_sortable, LogField, LogRecord};

use crate::migrations::{run_migrations, MigrationError};
use crate::pool::{open_log_pool, LogPool, PoolError, StoreSettings};

/// Errors that can occur while opening a [`SqliteStore`].
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to get a connection: {0}")]
    Connection(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Log store over a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: LogPool,
}

impl SqliteStore {
    /// Wraps an existing pool. The schema must already be migrated.
    pub fn new(pool: LogPool) -> Self {
        Self { pool }
    }

    /// Opens the database at `path` and applies pending migrations.
    pub fn open(path: &str, settings: StoreSettings) -> Result<Self, OpenError> {
        let pool = open_log_pool(path, settings)?;
        let conn = pool.get()?;
        let applied = run_migrations(&conn)?;
        tracing::info!(path, applied, "log store ready");
        drop(conn);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &LogPool {
        &self.pool
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))
            .map_err(db_error)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

impl SearchStore for SqliteStore {
    fn index(&self, record: &LogRecord) -> Result<(), StoreError> {
        let doc =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let conn = self.conn()?;
        insert_entry(&conn, record, &doc).map_err(db_error)?;
        Ok(())
    }

    fn search(&self, query: &StoreQuery) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.conn()?;
        let filter = WhereClause::build(query);
        let direction = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let limit_idx = filter.params.len() + 1;
        let sql = format!(
            "SELECT doc FROM log_entries
             WHERE {}
             ORDER BY when_ts {direction}, id ASC
             LIMIT ?{limit_idx}",
            filter.sql
        );

        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let mut bound = filter.refs();
        bound.push(&limit);

        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(bound.as_slice(), |row| row.get::<_, String>(0))
            .map_err(db_error)?;

        let mut records = Vec::new();
        for row in rows {
            let doc = row.map_err(db_error)?;
            let record: LogRecord = serde_json::from_str(&doc)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn count_matching(&self, query: &StoreQuery) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let filter = WhereClause::build(query);
        let sql = format!("SELECT COUNT(*) FROM log_entries WHERE {}", filter.sql);
        let n: i64 = conn
            .query_row(&sql, filter.refs().as_slice(), |row| row.get(0))
            .map_err(db_error)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn terms(
        &self,
        query: &StoreQuery,
        field: LogField,
        size: usize,
    ) -> Result<Vec<TermCount>, StoreError> {
        let conn = self.conn()?;
        let filter = WhereClause::build(query);
        let column = column_for(field);
        let limit_idx = filter.params.len() + 1;
        let sql = format!(
            "SELECT COALESCE({column}, '') AS value, COUNT(*) AS n
             FROM log_entries
             WHERE {}
             GROUP BY value
             ORDER BY n DESC, value ASC
             LIMIT ?{limit_idx}",
            filter.sql
        );

        let limit = i64::try_from(size).unwrap_or(i64::MAX);
        let mut bound = filter.refs();
        bound.push(&limit);

        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(bound.as_slice(), |row| {
                Ok(TermCount {
                    value: row.get(0)?,
                    count: u64::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                })
            })
            .map_err(db_error)?;

        let mut buckets = Vec::new();
        for row in rows {
            buckets.push(row.map_err(db_error)?);
        }
        Ok(buckets)
    }
}

fn insert_entry(conn: &Connection, record: &LogRecord, doc: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO log_entries
            (id, log_type, app, system, module, pri, pri_rank, who, op,
             class_name, instance_id, status, error, remote_ip, msg, when_ts, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.id,
            record.log_type().as_str(),
            record.app,
            record.system,
            record.module,
            record.priority.map(|p| p.as_str()),
            record.priority.map(|p| i64::from(p.rank())),
            record.who,
            record.op,
            record.class_name,
            record.instance_id,
            record.status.as_str(),
            record.error,
            record.remote_ip,
            record.message,
            to_sortable(&record.when),
            doc,
        ],
    )
}

/// The `log_entries` column holding `field`.
fn column_for(field: LogField) -> &'static str {
    match field {
        LogField::App => "app",
        LogField::System => "system",
        LogField::Module => "module",
        LogField::LogType => "log_type",
        LogField::Priority => "pri",
        LogField::Who => "who",
        LogField::Op => "op",
        LogField::ClassName => "class_name",
        LogField::InstanceId => "instance_id",
        LogField::Status => "status",
        LogField::Error => "error",
        LogField::RemoteIp => "remote_ip",
        LogField::Message => "msg",
        LogField::When => "when_ts",
    }
}

/// A parameterised `WHERE` clause built from a store query.
struct WhereClause {
    sql: String,
    params: Vec<Box<dyn ToSql>>,
}

impl WhereClause {
    fn build(query: &StoreQuery) -> Self {
        let mut clauses = vec!["log_type = ?1".to_string()];
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(query.log_type.as_str())];

        for (field, value) in &query.matches {
            params.push(Box::new(value.clone()));
            clauses.push(format!("{} = ?{}", column_for(*field), params.len()));
        }

        if let Some(floor) = query.min_priority {
            params.push(Box::new(i64::from(floor.rank())));
            clauses.push(format!("pri_rank >= ?{}", params.len()));
        }

        if let Some(from) = &query.from {
            params.push(Box::new(to_sortable(from)));
            clauses.push(format!("when_ts >= ?{}", params.len()));
        }

        if let Some(to) = &query.to {
            params.push(Box::new(to_sortable(to)));
            clauses.push(format!("when_ts <= ?{}", params.len()));
        }

        if let Some(cursor) = &query.after {
            params.push(Box::new(to_sortable(&cursor.when)));
            let when_idx = params.len();
            params.push(Box::new(cursor.id.clone()));
            let id_idx = params.len();
            let past = match query.order {
                SortOrder::Ascending => ">",
                SortOrder::Descending => "<",
            };
            clauses.push(format!(
                "(when_ts {past} ?{when_idx} OR (when_ts = ?{when_idx} AND id > ?{id_idx}))"
            ));
        }

        if let Some(changed) = &query.changed_field {
            params.push(Box::new(changed.clone()));
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(doc, '$.data.changes') AS c
                         WHERE json_extract(c.value, '$.field') = ?{})",
                params.len()
            ));
        }

        Self {
            sql: clauses.join(" AND "),
            params,
        }
    }

    fn refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| &**p).collect()
    }
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
