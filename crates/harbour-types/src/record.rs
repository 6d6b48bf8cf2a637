//! The log record entity and its typed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::LogField;
use crate::priority::{LogType, Priority, Status};

/// A single audit, activity or debug event.
///
/// The log type is not stored separately: it is the tag of [`LogPayload`],
/// so a record can never carry a payload that disagrees with its type. On
/// the wire the tag and payload appear as the `logType` and `data` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Globally unique id, assigned at creation.
    pub id: String,
    pub app: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub module: String,
    /// Severity. Always `None` for change records.
    #[serde(rename = "pri", default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub who: String,
    #[serde(default)]
    pub op: String,
    /// Creation time; ties are broken by `id`.
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub error: String,
    #[serde(rename = "remoteIP", default)]
    pub remote_ip: String,
    #[serde(rename = "msg", default)]
    pub message: String,
    #[serde(flatten)]
    pub payload: LogPayload,
}

/// Type-specific body of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "logType", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogPayload {
    /// Free-form activity data.
    Activity(String),
    /// Field-level changes to one entity.
    Change(ChangeInfo),
    /// Caller location and diagnostics.
    Debug(DebugInfo),
}

impl LogPayload {
    pub fn log_type(&self) -> LogType {
        match self {
            Self::Activity(_) => LogType::Activity,
            Self::Change(_) => LogType::Change,
            Self::Debug(_) => LogType::Debug,
        }
    }
}

/// The set of field changes applied to one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    pub entity: String,
    pub op: String,
    #[serde(default)]
    pub changes: Vec<ChangeDetail>,
}

impl ChangeInfo {
    pub fn new(entity: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            op: op.into(),
            changes: Vec::new(),
        }
    }

    /// Appends a change and returns `self` for chaining.
    pub fn with_change(mut self, detail: ChangeDetail) -> Self {
        self.changes.push(detail);
        self
    }

    /// Whether any change in this set touches `field`.
    pub fn touches(&self, field: &str) -> bool {
        self.changes.iter().any(|c| c.field == field)
    }
}

/// One field change. Old and new values are stored as strings; the
/// conversion happens once, when the detail is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetail {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

impl ChangeDetail {
    pub fn new(
        field: impl Into<String>,
        old_value: impl std::fmt::Display,
        new_value: impl std::fmt::Display,
    ) -> Self {
        Self {
            field: field.into(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        }
    }

    /// Builds a detail from arbitrary JSON values. Strings are kept
    /// verbatim, anything else is rendered as compact JSON text.
    pub fn from_json(
        field: impl Into<String>,
        old_value: &serde_json::Value,
        new_value: &serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            old_value: stringify(old_value),
            new_value: stringify(new_value),
        }
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Diagnostics captured for a debug record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub pid: u32,
    pub runtime: String,
    pub file_name: String,
    pub line_number: u32,
    pub function_name: String,
    pub stack_trace: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl LogRecord {
    /// The record's log type, derived from its payload.
    pub fn log_type(&self) -> LogType {
        self.payload.log_type()
    }

    /// Change details, if this is a change record.
    pub fn change_info(&self) -> Option<&ChangeInfo> {
        match &self.payload {
            LogPayload::Change(info) => Some(info),
            _ => None,
        }
    }

    /// The string value of `field`. A missing priority reads as `""`.
    pub fn value_of(&self, field: LogField) -> String {
        match field {
            LogField::App => self.app.clone(),
            LogField::System => self.system.clone(),
            LogField::Module => self.module.clone(),
            LogField::LogType => self.log_type().as_str().to_string(),
            LogField::Priority => self
                .priority
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            LogField::Who => self.who.clone(),
            LogField::Op => self.op.clone(),
            LogField::ClassName => self.class_name.clone(),
            LogField::InstanceId => self.instance_id.clone(),
            LogField::Status => self.status.as_str().to_string(),
            LogField::Error => self.error.clone(),
            LogField::RemoteIp => self.remote_ip.clone(),
            LogField::Message => self.message.clone(),
            LogField::When => crate::time::to_sortable(&self.when),
        }
    }
}

/// Generates a fresh record id.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(payload: LogPayload, priority: Option<Priority>) -> LogRecord {
        LogRecord {
            id: new_record_id(),
            app: "kra".to_string(),
            system: "linux".to_string(),
            module: "kyc".to_string(),
            priority,
            who: "user2".to_string(),
            op: "update".to_string(),
            when: crate::time::monotonic_now(),
            class_name: "Customer".to_string(),
            instance_id: "c-17".to_string(),
            status: Status::Success,
            error: String::new(),
            remote_ip: "127.6.2.1".to_string(),
            message: "test".to_string(),
            payload,
        }
    }

    fn round_trip(record: &LogRecord) -> LogRecord {
        let json = serde_json::to_string(record).expect("record should serialize");
        serde_json::from_str(&json).expect("record should deserialize")
    }

    #[test]
    fn activity_record_round_trips() {
        let record = base(
            LogPayload::Activity("logged in".to_string()),
            Some(Priority::Warn),
        );
        let restored = round_trip(&record);
        assert_eq!(restored, record);
        assert_eq!(restored.log_type(), LogType::Activity);
    }

    #[test]
    fn change_record_round_trips() {
        let info = ChangeInfo::new("customer", "update")
            .with_change(ChangeDetail::new("name", "Suraj", "Suraj K"))
            .with_change(ChangeDetail::new("age", 21, 22));
        let record = base(LogPayload::Change(info), None);
        let restored = round_trip(&record);
        assert_eq!(restored, record);
        let info = restored.change_info().expect("change payload");
        assert_eq!(info.changes[1].old_value, "21");
        assert!(info.touches("age"));
        assert!(!info.touches("email"));
    }

    #[test]
    fn debug_record_round_trips() {
        let info = DebugInfo {
            pid: 4242,
            runtime: "rust".to_string(),
            file_name: "src/main.rs".to_string(),
            line_number: 12,
            function_name: "app::main".to_string(),
            stack_trace: "frame 0".to_string(),
            data: serde_json::json!({ "k": [1, 2] }),
        };
        let record = base(LogPayload::Debug(info), Some(Priority::Debug1));
        let restored = round_trip(&record);
        assert_eq!(restored, record);
        assert_eq!(restored.log_type(), LogType::Debug);
    }

    #[test]
    fn wire_shape_uses_camel_case_keys() {
        let record = base(LogPayload::Activity("x".to_string()), Some(Priority::Info));
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["logType"], "ACTIVITY");
        assert_eq!(value["data"], "x");
        assert_eq!(value["pri"], "INFO");
        assert_eq!(value["remoteIP"], "127.6.2.1");
        assert_eq!(value["className"], "Customer");
        assert_eq!(value["msg"], "test");
    }

    #[test]
    fn change_values_are_stringified_from_json() {
        let detail = ChangeDetail::from_json(
            "limits",
            &serde_json::json!({ "max": 3 }),
            &serde_json::json!("open"),
        );
        assert_eq!(detail.old_value, "{\"max\":3}");
        assert_eq!(detail.new_value, "open");
    }

    #[test]
    fn change_record_has_no_priority_value() {
        let record = base(LogPayload::Change(ChangeInfo::new("e", "op")), None);
        assert_eq!(record.value_of(LogField::Priority), "");
        assert_eq!(record.value_of(LogField::LogType), "CHANGE");
    }
}
