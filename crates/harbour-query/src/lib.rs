//! Log retrieval: filtering, merging, pagination and aggregation.
//!
//! A [`FilterRequest`] arrives from a caller and is validated into a
//! [`FilterSpec`]. The [`QueryEngine`] lowers the spec into one
//! [`StoreQuery`] per log type, runs them against a [`SearchStore`], and
//! merges the results into a single ordered sequence. [`paginate`] cuts
//! pages out of that sequence with a `(when, id)` keyset cursor, and the
//! [`Aggregator`] counts records per attribute value.

mod aggregate;
mod engine;
mod error;
mod filter;
mod paginate;
mod store;

pub use aggregate::{discrete_attribute, Aggregation, Aggregator};
pub use engine::{QueryEngine, QueryResult, DEFAULT_MAX_RECORDS};
pub use error::{QueryError, StoreError};
pub use filter::{Cursor, FilterRequest, FilterSpec, TimeWindow};
pub use paginate::{paginate, Page};
pub use store::{SearchStore, SortOrder, StoreQuery, TermCount};
