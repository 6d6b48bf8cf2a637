//! Attribute-frequency aggregation.

use std::collections::{BTreeMap, HashMap};

use harbour_types::LogField;

use crate::engine::QueryEngine;
use crate::error::QueryError;
use crate::filter::FilterSpec;
use crate::store::TermCount;

/// Result of [`Aggregator::aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// No record matched the filter.
    NotFound,
    /// Record count per distinct attribute value.
    Counts(BTreeMap<String, u64>),
}

impl Aggregation {
    /// Total number of records counted.
    pub fn total(&self) -> u64 {
        match self {
            Self::NotFound => 0,
            Self::Counts(counts) => counts.values().sum(),
        }
    }
}

/// Parses an attribute name and checks it can be aggregated.
pub fn discrete_attribute(name: &str) -> Result<LogField, QueryError> {
    name.parse::<LogField>()
        .ok()
        .filter(|f| f.is_discrete())
        .ok_or_else(|| QueryError::UnsupportedAttribute(name.to_string()))
}

/// Counts records per value of one discrete attribute.
#[derive(Clone)]
pub struct Aggregator {
    engine: QueryEngine,
}

impl Aggregator {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }

    /// Groups every record matching `spec` by `attribute`.
    ///
    /// Time constraints in `spec` are ignored, so the sum of the counts
    /// equals the size of the same query without a time window. Counting is
    /// done by the store and is not subject to the record cap.
    ///
    /// # Errors
    ///
    /// `QueryError::UnsupportedAttribute` for continuous or unknown
    /// attributes; any error from the underlying query.
    pub fn aggregate(&self, spec: &FilterSpec, attribute: &str) -> Result<Aggregation, QueryError> {
        let field = discrete_attribute(attribute)?;
        let counts: BTreeMap<String, u64> = self
            .merged_terms(spec, field, usize::MAX)?
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .collect();
        if counts.is_empty() {
            return Ok(Aggregation::NotFound);
        }
        Ok(Aggregation::Counts(counts))
    }

    /// The `size` most frequent values of `attribute`, counted by the store.
    ///
    /// Each dispatched log type is aggregated separately and the buckets
    /// are merged by value. Because each store aggregation is capped at
    /// `size`, counts for values near the cut-off can be undercounted.
    pub fn top_values(
        &self,
        spec: &FilterSpec,
        attribute: &str,
        size: usize,
    ) -> Result<Vec<TermCount>, QueryError> {
        let field = discrete_attribute(attribute)?;
        let mut buckets: Vec<TermCount> = self
            .merged_terms(spec, field, size)?
            .into_iter()
            .map(|(value, count)| TermCount { value, count })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        buckets.truncate(size);
        Ok(buckets)
    }

    fn merged_terms(
        &self,
        spec: &FilterSpec,
        field: LogField,
        size: usize,
    ) -> Result<HashMap<String, u64>, QueryError> {
        let plan = self.engine.plan(&spec.without_time())?;
        let mut merged: HashMap<String, u64> = HashMap::new();
        for query in &plan {
            for bucket in self.engine.store().terms(query, field, size)? {
                *merged.entry(bucket.value).or_insert(0) += bucket.count;
            }
        }
        Ok(merged)
    }
}
