//! Filter lowering, dispatch and merge.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use harbour_types::{LogRecord, LogType};

use crate::error::{QueryError, StoreError};
use crate::filter::{Cursor, FilterSpec};
use crate::paginate::{paginate, Page};
use crate::store::{SearchStore, SortOrder, StoreQuery};

/// Default cap on the records returned by one store query.
pub const DEFAULT_MAX_RECORDS: usize = 1_000;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Ordered records returned by [`QueryEngine::query`].
///
/// `records` is always a gap-free prefix of the full matching sequence.
/// `truncated` is set when a store query hit the cap, so more records may
/// follow the last one.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub records: Vec<LogRecord>,
    pub order: SortOrder,
    pub truncated: bool,
}

impl QueryResult {
    /// Cuts one page out of the result.
    ///
    /// A truncated result always yields a next cursor, even for a short
    /// page.
    pub fn page(self, cursor: Option<&Cursor>, page_size: usize) -> Page {
        let truncated = self.truncated;
        let mut page = paginate(self.records, self.order, cursor, page_size);
        if truncated && page.next_cursor.is_none() {
            page.next_cursor = page.records.last().map(|last| Cursor {
                when: last.when,
                id: last.id.clone(),
            });
        }
        page
    }
}

/// Translates filter specs into store queries and merges their results.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn SearchStore>,
    max_records: usize,
    clock: Clock,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self {
            store,
            max_records: DEFAULT_MAX_RECORDS,
            clock: Arc::new(Utc::now),
        }
    }

    /// Caps each store query at `max_records`. Larger result sets are
    /// reached by paging with a cursor.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Replaces the wall clock used to resolve `nDays`.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Lowers `spec` into one store query per dispatched log type.
    ///
    /// Without a log type, Change and Activity are queried and Debug is
    /// left out. A priority floor drops the Change query, since change
    /// records carry no priority. The cursor is pushed down to every query.
    pub fn plan(&self, spec: &FilterSpec) -> Result<Vec<StoreQuery>, QueryError> {
        let window = spec.window((self.clock)())?;
        let types = match spec.log_type {
            Some(t) => vec![t],
            None => vec![LogType::Change, LogType::Activity],
        };
        let matches = spec.field_matches();

        let queries = types
            .into_iter()
            .filter(|t| spec.priority_floor.is_none() || t.is_prioritised())
            .map(|log_type| StoreQuery {
                log_type,
                matches: matches.clone(),
                changed_field: match log_type {
                    LogType::Change => spec.changed_field.clone(),
                    _ => None,
                },
                min_priority: spec.priority_floor,
                from: window.from,
                to: window.to,
                order: window.order,
                after: spec.cursor.clone(),
                limit: self.max_records,
            })
            .collect();
        Ok(queries)
    }

    /// Runs `spec` and returns the merged, ordered records.
    ///
    /// Each log type is fetched as its own capped stream. When a stream
    /// hits the cap, records after its last one may be missing from it, so
    /// the merge is cut at the earliest such boundary.
    pub fn query(&self, spec: &FilterSpec) -> Result<QueryResult, QueryError> {
        let plan = self.plan(spec)?;
        let order = plan.first().map(|q| q.order).unwrap_or_default();

        let mut records = Vec::new();
        let mut boundary: Option<LogRecord> = None;
        for query in &plan {
            let found = self.store.search(query)?;
            tracing::debug!(
                log_type = %query.log_type,
                count = found.len(),
                "store query finished"
            );
            if found.len() >= query.limit {
                if let Some(last) = found.last() {
                    let earlier = match &boundary {
                        Some(current) => order.compare(last, current) == Ordering::Less,
                        None => true,
                    };
                    if earlier {
                        boundary = Some(last.clone());
                    }
                }
            }
            records.extend(found);
        }
        order.sort(&mut records);

        if let Some(boundary) = &boundary {
            records.retain(|r| order.compare(r, boundary) != Ordering::Greater);
        }

        Ok(QueryResult {
            records,
            order,
            truncated: boundary.is_some(),
        })
    }

    /// Number of records matching `spec`, regardless of cursor and cap.
    pub fn count(&self, spec: &FilterSpec) -> Result<u64, QueryError> {
        let mut total = 0;
        for query in self.plan(spec)? {
            let query = StoreQuery {
                after: None,
                ..query
            };
            total += self.store.count_matching(&query)?;
        }
        Ok(total)
    }

    /// Runs `work` against this engine on a blocking task, giving up after
    /// `deadline`.
    ///
    /// The blocking task is not interrupted on expiry. Queries are
    /// read-only, so its result is simply discarded.
    pub async fn within<T, F>(&self, deadline: Duration, work: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&QueryEngine) -> Result<T, QueryError> + Send + 'static,
    {
        let engine = self.clone();
        let task = tokio::task::spawn_blocking(move || work(&engine));
        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StoreError::Task(e.to_string()).into()),
            Err(_) => {
                tracing::warn!(?deadline, "query deadline exceeded");
                Err(QueryError::DeadlineExceeded(deadline))
            }
        }
    }

    /// [`QueryEngine::query`] bounded by `deadline`.
    pub async fn query_within(
        &self,
        spec: FilterSpec,
        deadline: Duration,
    ) -> Result<QueryResult, QueryError> {
        self.within(deadline, move |engine| engine.query(&spec)).await
    }
}
