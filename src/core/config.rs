//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::build::verdict::Verdict;
use crate::core::errors::{LgError, Result};
use crate::logger::jsonl::JsonlConfig;
use crate::monitor::gate::{DelayConfig, DelayUnit};
use crate::monitor::threshold::ThresholdConfig;

/// Full loadgate configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub delay: DelayConfig,
    pub logging: LoggingConfig,
    pub thresholds: Vec<ThresholdConfig>,
    /// File this configuration was loaded from (or would have been).
    #[serde(skip)]
    pub source_path: PathBuf,
}

/// Behaviour of a single monitored run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Raise the abort signal once the build verdict is failing.
    pub abort_at_failure: bool,
    /// Echo every snapshot and threshold check on the debug channel.
    pub log_replies: bool,
    /// Delay between polls used by the host driver.
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            abort_at_failure: false,
            log_replies: false,
            poll_interval_ms: 5_000,
        }
    }
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Capacity of the activity logger queue; overflowing events are dropped.
    pub queue_size: usize,
    pub jsonl_log: PathBuf,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_size: 1024,
            jsonl_log: data_dir().join("activity.jsonl"),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl LoggingConfig {
    /// Writer settings for the activity log, falling back to the temp dir.
    #[must_use]
    pub fn jsonl_config(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.jsonl_log.clone(),
            fallback_path: Some(env::temp_dir().join("loadgate").join("activity.jsonl")),
            max_size_bytes: self.max_size_bytes,
            max_rotated_files: self.max_rotated_files,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[LG-CONFIG] WARNING: HOME not set, falling back to /tmp");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("loadgate")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir()
            .join(".config")
            .join("loadgate")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file at the default path yields defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| LgError::io(&path_buf, source))?;
            Self::from_toml(&raw)?
        } else if path.is_some() {
            return Err(LgError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.source_path = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic FNV-1a hash of the effective config for logging.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Apply `LOADGATE_*` overrides read through `lookup`. Blank values are
    /// treated as unset.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        // monitor
        if let Some(raw) = get("LOADGATE_MONITOR_ABORT_AT_FAILURE") {
            self.monitor.abort_at_failure = parse_env("LOADGATE_MONITOR_ABORT_AT_FAILURE", &raw)?;
        }
        if let Some(raw) = get("LOADGATE_MONITOR_LOG_REPLIES") {
            self.monitor.log_replies = parse_env("LOADGATE_MONITOR_LOG_REPLIES", &raw)?;
        }
        if let Some(raw) = get("LOADGATE_MONITOR_POLL_INTERVAL_MS") {
            self.monitor.poll_interval_ms = parse_env("LOADGATE_MONITOR_POLL_INTERVAL_MS", &raw)?;
        }

        // delay
        if let Some(raw) = get("LOADGATE_DELAY_UNIT") {
            self.delay.unit = parse_delay_unit(&raw)?;
        }
        if let Some(raw) = get("LOADGATE_DELAY_VALUE") {
            self.delay.value = parse_env("LOADGATE_DELAY_VALUE", &raw)?;
        }

        // logging
        if let Some(raw) = get("LOADGATE_LOGGING_ENABLED") {
            self.logging.enabled = parse_env("LOADGATE_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = get("LOADGATE_LOGGING_QUEUE_SIZE") {
            self.logging.queue_size = parse_env("LOADGATE_LOGGING_QUEUE_SIZE", &raw)?;
        }
        if let Some(raw) = get("LOADGATE_LOGGING_JSONL_LOG") {
            self.logging.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Expand a leading `~/` in the log path.
    fn normalize_paths(&mut self) {
        let expanded = self
            .logging
            .jsonl_log
            .to_str()
            .and_then(|s| s.strip_prefix("~/"))
            .map(|rest| home_dir().join(rest));
        if let Some(path) = expanded {
            self.logging.jsonl_log = path;
        }
    }

    /// Reject configurations the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_ms == 0 {
            return Err(invalid("monitor.poll_interval_ms must be > 0"));
        }
        if self.logging.queue_size == 0 {
            return Err(invalid("logging.queue_size must be >= 1"));
        }

        let mut seen = HashSet::new();
        for t in &self.thresholds {
            if !seen.insert(t.id) {
                return Err(invalid(format!("duplicate threshold id {}", t.id)));
            }
            if !t.value.is_finite() {
                return Err(invalid(format!(
                    "threshold {} value must be finite, got {}",
                    t.id, t.value
                )));
            }
            if t.window == 0 {
                return Err(invalid(format!("threshold {} window must be >= 1", t.id)));
            }
            if t.result == Verdict::Success {
                return Err(invalid(format!(
                    "threshold {} result must be unstable, failure or error",
                    t.id
                )));
            }
        }
        Ok(())
    }
}

fn invalid(details: impl Into<String>) -> LgError {
    LgError::InvalidConfig {
        details: details.into(),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| LgError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_delay_unit(raw: &str) -> Result<DelayUnit> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "seconds" => Ok(DelayUnit::Seconds),
        "users" => Ok(DelayUnit::Users),
        other => Err(LgError::ConfigParse {
            context: "env",
            details: format!("LOADGATE_DELAY_UNIT={other:?}: expected seconds or users"),
        }),
    }
}
