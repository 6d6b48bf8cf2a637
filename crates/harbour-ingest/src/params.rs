//! Per-call logger parameters and record construction.

use harbour_types::{
    monotonic_now, new_record_id, ChangeInfo, DebugInfo, LogPayload, LogRecord, Priority, Status,
};
use serde::{Deserialize, Serialize};

/// The identity fields stamped onto every record a caller emits.
///
/// A plain owned value: cloning copies every field, and the `with_*`
/// methods return a new value, so per-request variations never leak back
/// into a shared template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogParams {
    pub app: String,
    pub system: String,
    pub module: String,
    /// Priority given to activity and debug records.
    #[serde(rename = "pri")]
    pub priority: Priority,
    pub who: String,
    pub op: String,
    pub class_name: String,
    pub instance_id: String,
    pub status: Status,
    pub error: String,
    #[serde(rename = "remoteIP")]
    pub remote_ip: String,
}

impl Default for LogParams {
    fn default() -> Self {
        Self {
            app: String::new(),
            system: String::new(),
            module: String::new(),
            priority: Priority::Info,
            who: String::new(),
            op: String::new(),
            class_name: String::new(),
            instance_id: String::new(),
            status: Status::Success,
            error: String::new(),
            remote_ip: String::new(),
        }
    }
}

/// Source location of a debug record, filled in by [`crate::log_debug!`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

impl LogParams {
    pub fn new(app: impl Into<String>, system: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            system: system.into(),
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_who(mut self, who: impl Into<String>) -> Self {
        self.who = who.into();
        self
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = op.into();
        self
    }

    pub fn with_instance(mut self, class_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self.instance_id = instance_id.into();
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    pub fn with_remote_ip(mut self, remote_ip: impl Into<String>) -> Self {
        self.remote_ip = remote_ip.into();
        self
    }

    /// Builds an activity record.
    pub fn activity(&self, message: impl Into<String>, data: impl Into<String>) -> LogRecord {
        self.record(
            message.into(),
            Some(self.priority),
            LogPayload::Activity(data.into()),
        )
    }

    /// Builds a change record. Change records carry no priority.
    pub fn change(&self, message: impl Into<String>, info: ChangeInfo) -> LogRecord {
        self.record(message.into(), None, LogPayload::Change(info))
    }

    /// Builds a debug record, capturing the process id and a stack trace.
    ///
    /// Capturing a backtrace is expensive; callers go through
    /// [`crate::IngestionPipeline::log_debug`], which consults the gate first.
    pub fn debug(
        &self,
        message: impl Into<String>,
        site: CallSite,
        data: serde_json::Value,
    ) -> LogRecord {
        let info = DebugInfo {
            pid: std::process::id(),
            runtime: runtime_version(),
            file_name: site.file.to_string(),
            line_number: site.line,
            function_name: site.function.to_string(),
            stack_trace: std::backtrace::Backtrace::force_capture().to_string(),
            data,
        };
        self.record(message.into(), Some(self.priority), LogPayload::Debug(info))
    }

    fn record(&self, message: String, priority: Option<Priority>, payload: LogPayload) -> LogRecord {
        LogRecord {
            id: new_record_id(),
            app: self.app.clone(),
            system: self.system.clone(),
            module: self.module.clone(),
            priority,
            who: self.who.clone(),
            op: self.op.clone(),
            when: monotonic_now(),
            class_name: self.class_name.clone(),
            instance_id: self.instance_id.clone(),
            status: self.status,
            error: self.error.clone(),
            remote_ip: self.remote_ip.clone(),
            message,
            payload,
        }
    }
}

fn runtime_version() -> String {
    format!(
        "harbour/{} ({}-{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
