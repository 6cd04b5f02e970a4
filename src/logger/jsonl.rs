//! JSONL run log: one self-contained JSON object per line.
//!
//! Lines are built in memory and written with a single `write_all` so a
//! CI job tailing the file never sees a partial line. When the primary path
//! cannot be written the writer degrades: fallback path, then stderr with an
//! `[LG-JSONL]` prefix, then silent discard. Monitoring never fails because
//! of logging.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{LgError, Result};

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// What happened during the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunSetup,
    StateChange,
    TrafficStarted,
    GateOpened,
    ThresholdExceeded,
    AbortRequested,
    RunCompleted,
    RunFailed,
    RunAborted,
    Error,
}

/// One line of the run log. Only `ts`, `event` and `severity` are always set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<u64>,
    /// Monitoring state, or `from->to` for transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            test_id: None,
            state: None,
            threshold_id: None,
            metric: None,
            verdict: None,
            observed: None,
            error_code: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

/// Where and how much to write.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Used when `path` cannot be opened or written.
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the file would grow past this size.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`.
    pub max_rotated_files: u32,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("loadgate").join("activity.jsonl"),
            fallback_path: None,
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL writer with rotation and degradation.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    sink: Sink,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log, falling through the degradation chain as needed.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            sink: Sink::Discard,
            bytes_written: 0,
        };
        w.open_primary();
        w
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LG-JSONL] serialize error: {e}");
            }
        }
    }

    /// Flush buffered lines and sync them to disk.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
    }

    /// Current sink: `primary`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &'static str {
        match self.sink {
            Sink::Primary => "primary",
            Sink::Fallback => "fallback",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if matches!(self.sink, Sink::Primary | Sink::Fallback)
            && self.bytes_written > 0
            && self.bytes_written + len > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.sink {
            Sink::Primary | Sink::Fallback => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.bytes_written += len;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[LG-JSONL] {line}");
            }
            Sink::Discard => {}
        }
    }

    fn open_primary(&mut self) {
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.attach(file, size, Sink::Primary);
        } else {
            self.open_fallback();
        }
    }

    fn open_fallback(&mut self) {
        let opened = self
            .config
            .fallback_path
            .clone()
            .and_then(|fb| open_append(&fb).ok().map(|opened| (fb, opened)));
        match opened {
            Some((fb, (file, size))) => {
                let _ = writeln!(
                    io::stderr(),
                    "[LG-JSONL] primary path unusable, writing to {}",
                    fb.display()
                );
                self.attach(file, size, Sink::Fallback);
            }
            None => {
                let _ = writeln!(io::stderr(), "[LG-JSONL] no writable log path, using stderr");
                self.writer = None;
                self.sink = Sink::Stderr;
            }
        }
    }

    fn attach(&mut self, file: File, size: u64, sink: Sink) {
        self.writer = Some(BufWriter::new(file));
        self.bytes_written = size;
        self.sink = sink;
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.sink {
            Sink::Primary => self.open_fallback(),
            Sink::Fallback => {
                let _ = writeln!(io::stderr(), "[LG-JSONL] fallback write failed, using stderr");
                self.sink = Sink::Stderr;
            }
            Sink::Stderr | Sink::Discard => self.sink = Sink::Discard,
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = match (self.sink, &self.config.fallback_path) {
            (Sink::Primary, _) => self.config.path.clone(),
            (Sink::Fallback, Some(fb)) => fb.clone(),
            _ => return,
        };

        let keep = self.config.max_rotated_files;
        if keep == 0 {
            let _ = fs::remove_file(&base);
        } else {
            let _ = fs::remove_file(rotated_name(&base, keep));
            for i in (1..keep).rev() {
                let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
            }
            let _ = fs::rename(&base, rotated_name(&base, 1));
        }

        let sink = self.sink;
        match open_append(&base) {
            Ok((file, _)) => self.attach(file, 0, sink),
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Open or create `path` for appending, creating parent directories.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LgError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LgError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

/// `run.jsonl` → `run.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
