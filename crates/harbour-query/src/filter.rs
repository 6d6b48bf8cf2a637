//! Query parameters: the raw request form and its validated counterpart.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use harbour_types::{parse_timestamp, LogField, LogType, Priority};

use crate::error::QueryError;
use crate::store::SortOrder;

/// Keyset position in an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub when: DateTime<Utc>,
    pub id: String,
}

/// Normalized, validated query parameters.
///
/// `log_type == None` means all types (Change and Activity; Debug records
/// are only returned when asked for explicitly).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub app: Option<String>,
    pub who: Option<String>,
    pub class_name: Option<String>,
    pub instance: Option<String>,
    pub op: Option<String>,
    pub remote_ip: Option<String>,
    pub log_type: Option<LogType>,
    pub priority_floor: Option<Priority>,
    pub from_ts: Option<DateTime<Utc>>,
    pub to_ts: Option<DateTime<Utc>>,
    pub n_days: Option<u32>,
    pub changed_field: Option<String>,
    pub cursor: Option<Cursor>,
}

/// The `when` bounds of a query and the order its results come back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
}

impl FilterSpec {
    /// Checks the `fromTs <= toTs` invariant.
    pub fn validate(&self) -> Result<(), QueryError> {
        match (self.from_ts, self.to_ts) {
            (Some(from), Some(to)) if from > to => Err(QueryError::InvalidRange { from, to }),
            _ => Ok(()),
        }
    }

    /// Resolves the time bounds against `now`.
    ///
    /// `nDays` only applies when neither explicit bound is given. With
    /// `fromTs` or `toTs` set it is dropped, so `toTs` plus `nDays` is an
    /// ascending query with no lower bound. Only a query bounded by `toTs`
    /// alone is returned newest first.
    pub fn window(&self, now: DateTime<Utc>) -> Result<TimeWindow, QueryError> {
        self.validate()?;
        let window = match (self.from_ts, self.to_ts, self.n_days) {
            (None, None, Some(days)) if days > 0 => TimeWindow {
                from: Some(now - Duration::days(i64::from(days))),
                to: Some(now),
                order: SortOrder::Ascending,
            },
            (None, Some(to), None) => TimeWindow {
                from: None,
                to: Some(to),
                order: SortOrder::Descending,
            },
            (from, to, _) => TimeWindow {
                from,
                to,
                order: SortOrder::Ascending,
            },
        };
        Ok(window)
    }

    /// The same filter with every time constraint and the cursor removed.
    pub fn without_time(&self) -> FilterSpec {
        FilterSpec {
            from_ts: None,
            to_ts: None,
            n_days: None,
            cursor: None,
            ..self.clone()
        }
    }

    /// Exact-match predicates for the identity fields that are set.
    pub fn field_matches(&self) -> Vec<(LogField, String)> {
        [
            (LogField::App, &self.app),
            (LogField::Who, &self.who),
            (LogField::ClassName, &self.class_name),
            (LogField::InstanceId, &self.instance),
            (LogField::Op, &self.op),
            (LogField::RemoteIp, &self.remote_ip),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_ref().map(|v| (field, v.clone())))
        .collect()
    }
}

/// Query parameters as they arrive over HTTP, either as a query string or
/// a JSON body. Every value is a string; [`FilterRequest::into_spec`]
/// parses and validates them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterRequest {
    /// Caller's access token. Required by the HTTP layer, not a filter.
    pub query_token: Option<String>,
    pub app: Option<String>,
    pub who: Option<String>,
    pub class_name: Option<String>,
    pub instance: Option<String>,
    pub op: Option<String>,
    #[serde(rename = "remoteIP", alias = "remoteIp")]
    pub remote_ip: Option<String>,
    #[serde(alias = "type")]
    pub log_type: Option<String>,
    #[serde(alias = "priority")]
    pub pri: Option<String>,
    #[serde(alias = "fromts")]
    pub from_ts: Option<String>,
    #[serde(alias = "tots")]
    pub to_ts: Option<String>,
    #[serde(alias = "ndays", deserialize_with = "loose_string")]
    pub n_days: Option<String>,
    #[serde(alias = "changedField")]
    pub field: Option<String>,
    #[serde(alias = "searchAfterTS")]
    pub search_after_ts: Option<String>,
    #[serde(rename = "searchAfterDocID", alias = "searchAfterDocId")]
    pub search_after_doc_id: Option<String>,
}

impl FilterRequest {
    /// The query token, if present and not blank.
    pub fn token(&self) -> Option<&str> {
        self.query_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Parses every parameter and checks the range invariant.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Validation` for a malformed timestamp, an
    /// unknown log type or priority, a bad day count, or half a cursor, and
    /// `QueryError::InvalidRange` when `fromTs` is after `toTs`.
    pub fn into_spec(self) -> Result<FilterSpec, QueryError> {
        let log_type = match blank_to_none(self.log_type) {
            None => None,
            Some(t) if t.eq_ignore_ascii_case("all") => None,
            Some(t) => Some(
                t.parse::<LogType>()
                    .map_err(|e| QueryError::Validation(e.to_string()))?,
            ),
        };

        let priority_floor = blank_to_none(self.pri)
            .map(|p| p.parse::<Priority>())
            .transpose()
            .map_err(|e| QueryError::Validation(e.to_string()))?;

        let n_days = blank_to_none(self.n_days)
            .map(|d| {
                d.parse::<u32>()
                    .map_err(|_| QueryError::Validation(format!("ndays must be a non-negative integer, got '{d}'")))
            })
            .transpose()?;

        let cursor = match (
            blank_to_none(self.search_after_ts),
            blank_to_none(self.search_after_doc_id),
        ) {
            (None, None) => None,
            (Some(ts), Some(id)) => Some(Cursor {
                when: timestamp("searchAfterTs", &ts)?,
                id,
            }),
            _ => {
                return Err(QueryError::Validation(
                    "searchAfterTs and searchAfterDocID must be given together".to_string(),
                ))
            }
        };

        let spec = FilterSpec {
            app: blank_to_none(self.app),
            who: blank_to_none(self.who),
            class_name: blank_to_none(self.class_name),
            instance: blank_to_none(self.instance),
            op: blank_to_none(self.op),
            remote_ip: blank_to_none(self.remote_ip),
            log_type,
            priority_floor,
            from_ts: blank_to_none(self.from_ts)
                .map(|ts| timestamp("fromTs", &ts))
                .transpose()?,
            to_ts: blank_to_none(self.to_ts)
                .map(|ts| timestamp("toTs", &ts))
                .transpose()?,
            n_days,
            changed_field: blank_to_none(self.field),
            cursor,
        };
        spec.validate()?;
        Ok(spec)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, QueryError> {
    parse_timestamp(value).map_err(|e| QueryError::Validation(format!("{name}: {e}")))
}

/// Accepts a JSON string or integer and keeps it as a string, so that
/// `nDays` parses the same from a query string and from a JSON body.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
        Loose::Text(s) => s,
        Loose::Number(n) => n.to_string(),
    }))
}
