//! Severity levels, log types and outcome status.

use serde::{Deserialize, Serialize};

/// Log priority, ordered from least to most severe.
///
/// `Unknown` is the sentinel for unparsable input and ranks below every
/// real level, so a gate set to any real level never admits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    /// Unparsable or missing priority.
    Unknown,
    /// Most verbose debug level.
    Debug2,
    /// Intermediate debug level.
    Debug1,
    /// Least verbose debug level.
    Debug0,
    /// Informational.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
    /// Critical.
    Crit,
    /// Security-relevant event.
    Sec,
}

impl Priority {
    /// All real levels in ascending severity. `Unknown` is not included.
    pub const LEVELS: [Priority; 8] = [
        Self::Debug2,
        Self::Debug1,
        Self::Debug0,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Crit,
        Self::Sec,
    ];

    /// Ordinal rank; `Unknown` is 0, `Debug2` is 1, `Sec` is 8.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Priority::rank`].
    pub fn from_rank(rank: u8) -> Self {
        match rank {
            1 => Self::Debug2,
            2 => Self::Debug1,
            3 => Self::Debug0,
            4 => Self::Info,
            5 => Self::Warn,
            6 => Self::Error,
            7 => Self::Crit,
            8 => Self::Sec,
            _ => Self::Unknown,
        }
    }

    /// Returns the canonical string label for this priority.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Debug2 => "DEBUG2",
            Self::Debug1 => "DEBUG1",
            Self::Debug0 => "DEBUG0",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERR",
            Self::Crit => "CRIT",
            Self::Sec => "SEC",
        }
    }

    /// Case-insensitive parse that maps anything unrecognised to `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }

    /// Whether a record of this priority passes a floor of `floor`.
    pub fn at_least(self, floor: Priority) -> bool {
        self.rank() >= floor.rank()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::LEVELS
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseLevelError::Priority(s.to_string()))
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.as_str().to_string()
    }
}

/// The kind of a log record. Determined by its payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    /// A data-change (audit) record.
    Change,
    /// A user or system activity record.
    Activity,
    /// A debug record with caller information.
    Debug,
}

impl LogType {
    /// Returns the canonical string label for this log type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Change => "CHANGE",
            Self::Activity => "ACTIVITY",
            Self::Debug => "DEBUG",
        }
    }

    /// Whether admission of this type depends on the record's priority.
    pub fn is_prioritised(self) -> bool {
        !matches!(self, Self::Change)
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogType {
    type Err = ParseLevelError;

    /// Accepts the full names and the single-letter forms `A`, `C`, `D`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "ACTIVITY" => Ok(Self::Activity),
            "C" | "CHANGE" => Ok(Self::Change),
            "D" | "DEBUG" => Ok(Self::Debug),
            _ => Err(ParseLevelError::LogType(s.to_string())),
        }
    }
}

/// Outcome of the operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The operation succeeded.
    #[default]
    Success,
    /// The operation failed.
    Failure,
}

impl Status {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            _ => Err(ParseLevelError::Status(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown priority, log type or status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLevelError {
    /// Not one of the priority labels.
    #[error("unknown priority: {0}")]
    Priority(String),
    /// Not a log type name or letter.
    #[error("unknown log type: {0}")]
    LogType(String),
    /// Not `SUCCESS` or `FAILURE`.
    #[error("unknown status: {0}")]
    Status(String),
}
