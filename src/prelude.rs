//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use loadgate::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{LgError, Result};

// Client
pub use crate::client::replay::ReplaySession;
pub use crate::client::source::{MetricSource, TestClient};
pub use crate::client::types::{
    MetricSample, RemoteStatus, ScheduleStep, StandardMetric, TestSnapshot,
};

// Build
pub use crate::build::verdict::{BuildVerdict, Verdict, VerdictSink};

// Monitor
pub use crate::monitor::gate::{DelayConfig, DelayGate, DelayUnit};
pub use crate::monitor::progress::ProgressTracker;
pub use crate::monitor::state::{MonitoringState, next_state};
pub use crate::monitor::threshold::{
    Operator, Threshold, ThresholdCheck, ThresholdConfig, ThresholdSet,
};

// Logger
pub use crate::logger::activity::{ActivityLoggerConfig, spawn_activity_logger};
pub use crate::logger::console::{ConsoleLogger, LoadTestLogger, MemoryLogger};

// Runner
pub use crate::runner::driver::{MonitorOptions, RunOutcome, RunReport, TestMonitor};
pub use crate::runner::listener::{ListenerOptions, LoadTestListener, TickOutcome};
