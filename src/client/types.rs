//! Remote test model: snapshots, status codes, load schedule, metric samples.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

// ──────────────────── remote status ────────────────────

/// Status of a load test as reported by the remote service.
///
/// Codes outside the known range are preserved as `Unknown` so that
/// every value the service sends has a defined meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum RemoteStatus {
    Created,
    Queued,
    Initializing,
    Running,
    Finished,
    TimedOut,
    AbortingUser,
    AbortedUser,
    AbortingSystem,
    AbortedSystem,
    AbortedScriptError,
    AbortingThreshold,
    AbortedThreshold,
    FailedThreshold,
    Unknown(i32),
}

/// Coarse classification used by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Accepted by the service but not producing load yet.
    Pending,
    /// Actively generating load.
    Running,
    /// Shutting down after an abort request; not terminal yet.
    Aborting,
    /// Ran to completion.
    Completed,
    /// Terminal without completing: timed out, aborted, or failed.
    Failed,
    /// Code not understood by this client.
    Unknown,
}

impl RemoteStatus {
    /// Integer code used on the wire.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Created => -1,
            Self::Queued => 0,
            Self::Initializing => 1,
            Self::Running => 2,
            Self::Finished => 3,
            Self::TimedOut => 4,
            Self::AbortingUser => 5,
            Self::AbortedUser => 6,
            Self::AbortingSystem => 7,
            Self::AbortedSystem => 8,
            Self::AbortedScriptError => 9,
            Self::AbortingThreshold => 10,
            Self::AbortedThreshold => 11,
            Self::FailedThreshold => 12,
            Self::Unknown(code) => code,
        }
    }

    #[must_use]
    pub const fn class(self) -> StatusClass {
        match self {
            Self::Created | Self::Queued | Self::Initializing => StatusClass::Pending,
            Self::Running => StatusClass::Running,
            Self::AbortingUser | Self::AbortingSystem | Self::AbortingThreshold => {
                StatusClass::Aborting
            }
            Self::Finished => StatusClass::Completed,
            Self::TimedOut
            | Self::AbortedUser
            | Self::AbortedSystem
            | Self::AbortedScriptError
            | Self::AbortedThreshold
            | Self::FailedThreshold => StatusClass::Failed,
            Self::Unknown(_) => StatusClass::Unknown,
        }
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self.class(), StatusClass::Running)
    }

    /// Completed or failed: the remote test will not change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self.class(), StatusClass::Completed | StatusClass::Failed)
    }

    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self.class(), StatusClass::Completed)
    }

    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self.class(), StatusClass::Failed)
    }
}

impl From<i32> for RemoteStatus {
    fn from(code: i32) -> Self {
        match code {
            -1 => Self::Created,
            0 => Self::Queued,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::Finished,
            4 => Self::TimedOut,
            5 => Self::AbortingUser,
            6 => Self::AbortedUser,
            7 => Self::AbortingSystem,
            8 => Self::AbortedSystem,
            9 => Self::AbortedScriptError,
            10 => Self::AbortingThreshold,
            11 => Self::AbortedThreshold,
            12 => Self::FailedThreshold,
            other => Self::Unknown(other),
        }
    }
}

impl From<RemoteStatus> for i32 {
    fn from(status: RemoteStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Initializing => write!(f, "INITIALIZING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::TimedOut => write!(f, "TIMED_OUT"),
            Self::AbortingUser => write!(f, "ABORTING_USER"),
            Self::AbortedUser => write!(f, "ABORTED_USER"),
            Self::AbortingSystem => write!(f, "ABORTING_SYSTEM"),
            Self::AbortedSystem => write!(f, "ABORTED_SYSTEM"),
            Self::AbortedScriptError => write!(f, "ABORTED_SCRIPT_ERROR"),
            Self::AbortingThreshold => write!(f, "ABORTING_THRESHOLD"),
            Self::AbortedThreshold => write!(f, "ABORTED_THRESHOLD"),
            Self::FailedThreshold => write!(f, "FAILED_THRESHOLD"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

// ──────────────────── snapshot ────────────────────

/// One poll of the remote test. Created fresh every tick by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSnapshot {
    pub id: u64,
    pub title: String,
    pub status: RemoteStatus,
    /// Public results page; absent until load traffic begins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl TestSnapshot {
    /// Results URL, only once it looks like a real link.
    #[must_use]
    pub fn results_url(&self) -> Option<&str> {
        self.public_url
            .as_deref()
            .filter(|url| url.starts_with("http"))
    }
}

// ──────────────────── load schedule ────────────────────

/// One step of the planned load schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStep {
    /// Planned duration in minutes.
    pub duration: u32,
    /// Target virtual users at the end of the step.
    #[serde(default)]
    pub users: u32,
}

/// Sum of all step durations in minutes.
#[must_use]
pub fn total_duration_minutes(steps: &[ScheduleStep]) -> u64 {
    steps.iter().map(|s| u64::from(s.duration)).sum()
}

/// Highest user target in the schedule.
#[must_use]
pub fn peak_users(steps: &[ScheduleStep]) -> u32 {
    steps.iter().map(|s| s.users).max().unwrap_or(0)
}

// ──────────────────── metrics ────────────────────

/// Metrics every test produces, named the way configuration refers to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StandardMetric {
    UserLoadTime,
    ClientsActive,
    ProgressPercentTotal,
    RequestsPerSecond,
    Bandwidth,
    FailureRate,
    ConnectionsActive,
    TotalRequests,
    TotalRxBytes,
    RepsFailedPercent,
    RepsSucceededPercent,
    LoadgenCpuUtilization,
    LoadgenMemoryUtilization,
}

impl StandardMetric {
    /// Identifier used by the remote service.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::UserLoadTime => "__li_user_load_time",
            Self::ClientsActive => "__li_clients_active",
            Self::ProgressPercentTotal => "__li_progress_percent_total",
            Self::RequestsPerSecond => "__li_requests_per_second",
            Self::Bandwidth => "__li_bandwidth",
            Self::FailureRate => "__li_failure_rate",
            Self::ConnectionsActive => "__li_connections_active",
            Self::TotalRequests => "__li_total_requests",
            Self::TotalRxBytes => "__li_total_rx_bytes",
            Self::RepsFailedPercent => "__li_reps_failed_percent",
            Self::RepsSucceededPercent => "__li_reps_succeeded_percent",
            Self::LoadgenCpuUtilization => "__li_loadgen_cpu_utilization",
            Self::LoadgenMemoryUtilization => "__li_loadgen_memory_utilization",
        }
    }

    /// Name as written in configuration, e.g. `USER_LOAD_TIME`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UserLoadTime => "USER_LOAD_TIME",
            Self::ClientsActive => "CLIENTS_ACTIVE",
            Self::ProgressPercentTotal => "PROGRESS_PERCENT_TOTAL",
            Self::RequestsPerSecond => "REQUESTS_PER_SECOND",
            Self::Bandwidth => "BANDWIDTH",
            Self::FailureRate => "FAILURE_RATE",
            Self::ConnectionsActive => "CONNECTIONS_ACTIVE",
            Self::TotalRequests => "TOTAL_REQUESTS",
            Self::TotalRxBytes => "TOTAL_RX_BYTES",
            Self::RepsFailedPercent => "REPS_FAILED_PERCENT",
            Self::RepsSucceededPercent => "REPS_SUCCEEDED_PERCENT",
            Self::LoadgenCpuUtilization => "LOADGEN_CPU_UTILIZATION",
            Self::LoadgenMemoryUtilization => "LOADGEN_MEMORY_UTILIZATION",
        }
    }
}

impl fmt::Display for StandardMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single observation of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub value: f64,
    pub metric: StandardMetric,
}

impl MetricSample {
    #[must_use]
    pub const fn new(metric: StandardMetric, timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
            metric,
        }
    }
}
