//! The search store seam.
//!
//! The engine never talks to a database directly. It lowers a
//! [`crate::FilterSpec`] into one [`StoreQuery`] per log type and hands
//! those to a [`SearchStore`].

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use harbour_types::{LogField, LogRecord, LogType, Priority};

use crate::error::StoreError;
use crate::filter::Cursor;

/// Direction of a result sequence.
///
/// Ties on `when` are always broken by `id` ascending, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Compares two records by `(when, id)` in this order.
    pub fn compare(self, a: &LogRecord, b: &LogRecord) -> Ordering {
        let by_when = match self {
            Self::Ascending => a.when.cmp(&b.when),
            Self::Descending => b.when.cmp(&a.when),
        };
        by_when.then_with(|| a.id.cmp(&b.id))
    }

    /// Sorts `records` in place.
    pub fn sort(self, records: &mut [LogRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }

    /// Whether `record` comes strictly after `cursor` in this order.
    pub fn is_past(self, record: &LogRecord, cursor: &Cursor) -> bool {
        let past_when = match self {
            Self::Ascending => record.when > cursor.when,
            Self::Descending => record.when < cursor.when,
        };
        past_when || (record.when == cursor.when && record.id > cursor.id)
    }
}

/// A single-log-type query against the store.
///
/// All predicates are conjunctive. `from` and `to` are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub log_type: LogType,
    /// Exact value matches on identity fields.
    pub matches: Vec<(LogField, String)>,
    /// Change records only: the change list must name this field.
    pub changed_field: Option<String>,
    /// Records ranked below this priority are excluded.
    pub min_priority: Option<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    /// Keyset position: only records strictly after it in `order` match.
    pub after: Option<Cursor>,
    /// Maximum number of records returned.
    pub limit: usize,
}

/// One bucket of a terms aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCount {
    pub value: String,
    pub count: u64,
}

/// Indexed document store holding log records.
///
/// Implementations are synchronous; async callers run them on blocking
/// tasks.
pub trait SearchStore: Send + Sync {
    /// Stores `record`. Indexing the same id twice keeps one copy.
    fn index(&self, record: &LogRecord) -> Result<(), StoreError>;

    /// Returns the records matching `query`, in `query.order`, at most
    /// `query.limit` of them.
    fn search(&self, query: &StoreQuery) -> Result<Vec<LogRecord>, StoreError>;

    /// Number of records matching `query`, ignoring `query.limit`.
    fn count_matching(&self, query: &StoreQuery) -> Result<u64, StoreError> {
        let unbounded = StoreQuery {
            limit: usize::MAX,
            ..query.clone()
        };
        Ok(self.search(&unbounded)?.len() as u64)
    }

    /// Counts the records matching `query` per distinct value of `field`,
    /// returning at most `size` buckets, most frequent first.
    fn terms(
        &self,
        query: &StoreQuery,
        field: LogField,
        size: usize,
    ) -> Result<Vec<TermCount>, StoreError>;
}
