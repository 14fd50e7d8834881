use crate::errors::CerveauError;
use crate::log_retention::{prune_rotated_logs, rotate_active_log};
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
    pub min_level: LogLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

#[derive(Serialize)]
struct LogLine<'a> {
    ts: u64,
    level: &'a str,
    event_type: &'a str,
    payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            min_level: LogLevel::Info,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), CerveauError> {
        let level = LogLevel::parse(event.level).unwrap_or(LogLevel::Info);
        if level < self.min_level {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CerveauError::Io(e.to_string()))?;
        }
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let line = serde_json::to_string(&LogLine {
            ts,
            level: event.level,
            event_type: event.event_type,
            payload: truncate_json(event.payload.clone(), self.max_payload_bytes),
        })
        .map_err(|e| CerveauError::Io(e.to_string()))?;

        // The active file holds at most half the budget so that it and the
        // newest rotated file fit together.
        let line_len = line.len() as u64 + 1;
        let active_len = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if active_len > 0 && active_len + line_len > self.budget_bytes / 2 {
            rotate_active_log(&self.path)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CerveauError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| CerveauError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| CerveauError::Io(e.to_string()))?;

        prune_rotated_logs(&self.path, self.budget_bytes)?;
        Ok(())
    }
}

fn run_logger() -> &'static Mutex<Option<JsonlLogger>> {
    static RUN_LOGGER: OnceLock<Mutex<Option<JsonlLogger>>> = OnceLock::new();
    RUN_LOGGER.get_or_init(|| Mutex::new(None))
}

pub fn init_run_logger(logger: JsonlLogger) {
    let mut slot = run_logger()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(logger);
}

/// Best-effort: a missing logger or a failed write never reaches the caller.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let slot = run_logger()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(logger) = slot.as_ref() {
        let _ = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}
