//! Attribute names of a log record.

/// A named attribute of a [`crate::LogRecord`].
///
/// Used to address record fields in store queries and to select the
/// attribute of a frequency aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogField {
    App,
    System,
    Module,
    LogType,
    Priority,
    Who,
    Op,
    ClassName,
    InstanceId,
    Status,
    Error,
    RemoteIp,
    Message,
    When,
}

impl LogField {
    /// Attributes with a finite set of values, the only ones that can be
    /// aggregated.
    pub const DISCRETE: [LogField; 11] = [
        Self::App,
        Self::LogType,
        Self::Op,
        Self::InstanceId,
        Self::ClassName,
        Self::Module,
        Self::Priority,
        Self::Status,
        Self::RemoteIp,
        Self::System,
        Self::Who,
    ];

    /// The JSON name of this attribute on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::System => "system",
            Self::Module => "module",
            Self::LogType => "logType",
            Self::Priority => "pri",
            Self::Who => "who",
            Self::Op => "op",
            Self::ClassName => "className",
            Self::InstanceId => "instanceId",
            Self::Status => "status",
            Self::Error => "error",
            Self::RemoteIp => "remoteIP",
            Self::Message => "msg",
            Self::When => "when",
        }
    }

    /// Whether the attribute takes values from a finite set.
    pub fn is_discrete(self) -> bool {
        Self::DISCRETE.contains(&self)
    }
}

impl std::fmt::Display for LogField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl std::str::FromStr for LogField {
    type Err = UnknownFieldError;

    /// Accepts wire names case-insensitively plus the short aliases used by
    /// query callers (`type`, `priority`, `class`, `instance`, `message`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim().to_ascii_lowercase().as_str() {
            "app" => Self::App,
            "system" => Self::System,
            "module" => Self::Module,
            "logtype" | "type" => Self::LogType,
            "pri" | "priority" => Self::Priority,
            "who" => Self::Who,
            "op" => Self::Op,
            "classname" | "class" => Self::ClassName,
            "instanceid" | "instance" => Self::InstanceId,
            "status" => Self::Status,
            "error" => Self::Error,
            "remoteip" => Self::RemoteIp,
            "msg" | "message" => Self::Message,
            "when" => Self::When,
            _ => return Err(UnknownFieldError(s.to_string())),
        };
        Ok(field)
    }
}

/// Error returned when parsing an unknown attribute name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log attribute: {0}")]
pub struct UnknownFieldError(pub String);
