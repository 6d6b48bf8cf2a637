//! Durable local fallback for records the bus could not take.

use harbour_types::LogRecord;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Append-only file of serialized records, one JSON document per line.
///
/// Each append is a single `write_all` of the full line followed by an
/// fsync, under a mutex, so concurrent writers never interleave partial
/// records.
#[derive(Debug)]
pub struct FallbackSink {
    path: PathBuf,
    file: Mutex<File>,
}

/// Outcome of [`FallbackSink::recover`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Records accepted by the callback and removed from the sink.
    pub recovered: usize,
    /// Records the callback rejected. They stay in the sink.
    pub kept: usize,
    /// Unparseable lines moved to the quarantine file.
    pub quarantined: usize,
}

impl FallbackSink {
    /// Opens (or creates) the sink file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where unparseable lines are moved during recovery.
    pub fn quarantine_path(&self) -> PathBuf {
        with_suffix(&self.path, ".corrupt")
    }

    /// Appends one serialized record.
    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        write_line(&mut file, line)
    }

    /// Reads every parseable record currently in the sink without removing
    /// them. Corrupt lines are skipped.
    pub fn read_records(&self) -> io::Result<Vec<LogRecord>> {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let records = read_lines(&file)?
            .into_iter()
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();
        Ok(records)
    }

    /// Hands every record in the sink to `accept` and removes the ones it
    /// takes.
    ///
    /// The sink file is only rewritten after every record has been offered,
    /// so a crash part way through leaves it intact and the next recovery
    /// offers the same records again. Rejected records stay in the sink.
    /// Lines that do not parse are appended to [`Self::quarantine_path`].
    pub fn recover<F, E>(&self, mut accept: F) -> io::Result<Recovery>
    where
        F: FnMut(&LogRecord) -> Result<(), E>,
        E: Display,
    {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let lines = read_lines(&file)?;
        if lines.is_empty() {
            return Ok(Recovery::default());
        }

        let mut recovery = Recovery::default();
        let mut kept = Vec::new();
        let mut corrupt = Vec::new();
        for (n, line) in lines.into_iter().enumerate() {
            let record: LogRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line = n + 1, error = %e, "quarantining unreadable fallback line");
                    corrupt.push(line);
                    continue;
                }
            };
            match accept(&record) {
                Ok(()) => recovery.recovered += 1,
                Err(e) => {
                    tracing::error!(id = %record.id, error = %e, "recovery failed, keeping record in fallback sink");
                    kept.push(line);
                }
            }
        }
        recovery.kept = kept.len();
        recovery.quarantined = corrupt.len();

        if !corrupt.is_empty() {
            let mut quarantine = open_append(&self.quarantine_path())?;
            for line in &corrupt {
                write_line(&mut quarantine, line)?;
            }
        }

        let staging = with_suffix(&self.path, ".tmp");
        {
            let mut rewritten = File::create(&staging)?;
            for line in &kept {
                rewritten.write_all(line.as_bytes())?;
                rewritten.write_all(b"\n")?;
            }
            rewritten.sync_all()?;
        }
        std::fs::rename(&staging, &self.path)?;
        *file = open_append(&self.path)?;

        Ok(recovery)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn write_line(file: &mut File, line: &str) -> io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())?;
    file.flush()?;
    file.sync_data()
}

/// Non-blank lines of the file, from the start.
fn read_lines(file: &File) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbour_types::{new_record_id, monotonic_now, LogPayload, Priority, Status};

    fn record(message: &str) -> LogRecord {
        LogRecord {
            id: new_record_id(),
            app: "kra".to_string(),
            system: String::new(),
            module: String::new(),
            priority: Some(Priority::Crit),
            who: String::new(),
            op: String::new(),
            when: monotonic_now(),
            class_name: String::new(),
            instance_id: String::new(),
            status: Status::Failure,
            error: String::new(),
            remote_ip: String::new(),
            message: message.to_string(),
            payload: LogPayload::Activity(String::new()),
        }
    }

    #[test]
    fn append_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FallbackSink::open(dir.path().join("spool/fallback.jsonl")).expect("open");

        let first = record("one");
        let second = record("two");
        sink.append(&serde_json::to_string(&first).expect("json"))
            .expect("append");
        sink.append(&serde_json::to_string(&second).expect("json"))
            .expect("append");

        let records = sink.read_records().expect("read");
        assert_eq!(records, vec![first, second]);
    }

    fn line(r: &LogRecord) -> String {
        serde_json::to_string(r).expect("json")
    }

    #[test]
    fn recover_removes_accepted_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FallbackSink::open(dir.path().join("fallback.jsonl")).expect("open");
        sink.append(&line(&record("x"))).expect("append");
        sink.append(&line(&record("y"))).expect("append");

        let mut seen = Vec::new();
        let recovery = sink
            .recover(|r| {
                seen.push(r.message.clone());
                Ok::<(), String>(())
            })
            .expect("recover");

        assert_eq!(seen, ["x", "y"]);
        assert_eq!(recovery.recovered, 2);
        assert!(sink.read_records().expect("read").is_empty());

        sink.append(&line(&record("z"))).expect("append after recovery");
        assert_eq!(sink.read_records().expect("read").len(), 1);
    }

    #[test]
    fn rejected_records_stay_in_the_sink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FallbackSink::open(dir.path().join("fallback.jsonl")).expect("open");
        sink.append(&line(&record("ok"))).expect("append");
        sink.append(&line(&record("fails"))).expect("append");

        let recovery = sink
            .recover(|r| {
                if r.message == "fails" {
                    Err("store unavailable")
                } else {
                    Ok(())
                }
            })
            .expect("recover");

        assert_eq!(recovery.recovered, 1);
        assert_eq!(recovery.kept, 1);
        let left = sink.read_records().expect("read");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message, "fails");
    }

    #[test]
    fn reopening_keeps_existing_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fallback.jsonl");
        {
            let sink = FallbackSink::open(&path).expect("open");
            sink.append(&line(&record("kept"))).expect("append");
        }
        let sink = FallbackSink::open(&path).expect("reopen");
        let records = sink.read_records().expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "kept");
    }

    #[test]
    fn torn_line_is_quarantined_and_the_rest_recovered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FallbackSink::open(dir.path().join("fallback.jsonl")).expect("open");
        let good = record("good");
        sink.append(&line(&good)).expect("append");
        sink.append(r#"{"id":"torn","app":"#).expect("append");

        assert_eq!(sink.read_records().expect("read"), vec![good.clone()]);

        let mut recovered = Vec::new();
        let recovery = sink
            .recover(|r| {
                recovered.push(r.clone());
                Ok::<(), String>(())
            })
            .expect("recover");

        assert_eq!(recovered, vec![good]);
        assert_eq!(
            recovery,
            Recovery {
                recovered: 1,
                kept: 0,
                quarantined: 1,
            }
        );
        assert!(sink.read_records().expect("read").is_empty());
        let quarantined = std::fs::read_to_string(sink.quarantine_path()).expect("quarantine");
        assert_eq!(quarantined, "{\"id\":\"torn\",\"app\":\n");
    }
}
