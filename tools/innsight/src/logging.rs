use crate::errors::ConsoleError;
use crate::log_retention::enforce_total_budget;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_SEGMENT_BYTES: u64 = 1024 * 1024;

/// Append-only JSONL event log for the console (fetches, failures, session
/// changes). Oversized payloads are truncated before serialization. Once the
/// active file outgrows `segment_bytes` it is rotated into a timestamped
/// segment, and the oldest segments are pruned to keep the log directory
/// under `budget_bytes`; the active file itself is never pruned.
#[derive(Debug, Clone)]
pub struct EventLog {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub segment_bytes: u64,
    pub budget_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl EventLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
            segment_bytes: DEFAULT_SEGMENT_BYTES,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), ConsoleError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConsoleError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| ConsoleError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        let written = file
            .metadata()
            .map_err(|e| ConsoleError::Io(e.to_string()))?
            .len();
        drop(file);

        if written > self.segment_bytes {
            self.rotate()?;
        }
        if let Some(parent) = self.path.parent() {
            let _ = enforce_total_budget(parent, self.budget_bytes, &self.path)?;
        }

        Ok(())
    }

    /// Renames the active file to a timestamped sibling segment. A collision
    /// within the same millisecond bumps the stamp until the name is free.
    fn rotate(&self) -> Result<(), ConsoleError> {
        let mut stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut target = segment_path(&self.path, stamp);
        while target.exists() {
            stamp += 1;
            target = segment_path(&self.path, stamp);
        }
        fs::rename(&self.path, &target).map_err(|e| ConsoleError::Io(e.to_string()))
    }

    pub fn info(&self, event_type: &str, payload: Value) -> Result<(), ConsoleError> {
        self.append(&LogEvent {
            level: "info",
            event_type,
            payload,
        })
    }

    pub fn warn(&self, event_type: &str, payload: Value) -> Result<(), ConsoleError> {
        self.append(&LogEvent {
            level: "warn",
            event_type,
            payload,
        })
    }
}

fn segment_path(active: &Path, stamp: u128) -> PathBuf {
    let stem = active
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("console");
    let ext = active
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("jsonl");
    active.with_file_name(format!("{stem}-{stamp}.{ext}"))
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut truncated = rendered;
    truncated.truncate(max_bytes.saturating_sub(3));
    Value::String(format!("{truncated}..."))
}
