//! Threaded activity logger: the listener sends structured events over a
//! bounded crossbeam channel to a dedicated thread that owns the
//! [`JsonlWriter`]. `try_send` keeps a monitoring tick from ever blocking on
//! log back-pressure; events that do not fit are counted and reported.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{LgError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

// ──────────────────── public event type ────────────────────

/// Structured run events mirrored into the JSONL log.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    RunSetup {
        total_minutes: u64,
        peak_users: u32,
        thresholds: usize,
    },
    StateChanged {
        test_id: u64,
        from: String,
        to: String,
    },
    TrafficStarted {
        test_id: u64,
        url: String,
    },
    GateOpened {
        test_id: u64,
        reason: String,
    },
    ThresholdExceeded {
        test_id: u64,
        threshold_id: u32,
        metric: String,
        verdict: String,
        observed: f64,
        reason: String,
    },
    AbortRequested {
        test_id: u64,
        reason: String,
    },
    RunCompleted {
        thresholds_exceeded: usize,
    },
    RunFailed {
        status: String,
    },
    RunAborted,
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cheaply cloneable handle for sending activity events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Non-blocking send. A full queue drops the event and bumps the
    /// dropped counter; a closed channel is ignored.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Like [`send`](Self::send) but reports a closed channel.
    pub fn try_send(&self, event: ActivityEvent) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(LgError::ChannelClosed {
                component: "activity-logger",
            }),
        }
    }

    /// Events dropped since the logger thread last reported them.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and stop. Blocks only until the
    /// sentinel is queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── configuration ────────────────────

/// Options for spawning the activity logger. The queue size has no
/// implicit default; callers pass the configured value.
#[derive(Debug, Clone)]
pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    /// Channel capacity; clamped to at least one.
    pub queue_size: usize,
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn new(jsonl_config: JsonlConfig, queue_size: usize) -> Self {
        Self {
            jsonl_config,
            queue_size,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread. It runs until [`ActivityLoggerHandle::shutdown`]
/// is called or every handle is dropped.
pub fn spawn_activity_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.queue_size.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let jsonl_config = config.jsonl_config;
    let join = thread::Builder::new()
        .name("loadgate-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl_config, &dropped_clone))
        .map_err(|e| LgError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    jsonl_config: JsonlConfig,
    dropped: &AtomicU64,
) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

// ──────────────────── event conversion ────────────────────

pub(crate) fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::RunSetup {
            total_minutes,
            peak_users,
            thresholds,
        } => {
            let mut e = LogEntry::new(EventType::RunSetup, Severity::Info);
            e.details = Some(format!(
                "total_minutes={total_minutes} peak_users={peak_users} thresholds={thresholds}"
            ));
            e
        }
        ActivityEvent::StateChanged { test_id, from, to } => {
            let mut e = LogEntry::new(EventType::StateChange, Severity::Info);
            e.test_id = Some(*test_id);
            e.state = Some(format!("{from}->{to}"));
            e
        }
        ActivityEvent::TrafficStarted { test_id, url } => {
            let mut e = LogEntry::new(EventType::TrafficStarted, Severity::Info);
            e.test_id = Some(*test_id);
            e.details = Some(url.clone());
            e
        }
        ActivityEvent::GateOpened { test_id, reason } => {
            let mut e = LogEntry::new(EventType::GateOpened, Severity::Info);
            e.test_id = Some(*test_id);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::ThresholdExceeded {
            test_id,
            threshold_id,
            metric,
            verdict,
            observed,
            reason,
        } => {
            let mut e = LogEntry::new(EventType::ThresholdExceeded, Severity::Warning);
            e.test_id = Some(*test_id);
            e.threshold_id = Some(*threshold_id);
            e.metric = Some(metric.clone());
            e.verdict = Some(verdict.clone());
            e.observed = Some(*observed);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::AbortRequested { test_id, reason } => {
            let mut e = LogEntry::new(EventType::AbortRequested, Severity::Warning);
            e.test_id = Some(*test_id);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::RunCompleted {
            thresholds_exceeded,
        } => {
            let mut e = LogEntry::new(EventType::RunCompleted, Severity::Info);
            e.details = Some(format!("thresholds_exceeded={thresholds_exceeded}"));
            e
        }
        ActivityEvent::RunFailed { status } => {
            let mut e = LogEntry::new(EventType::RunFailed, Severity::Warning);
            e.state = Some(status.clone());
            e
        }
        ActivityEvent::RunAborted => LogEntry::new(EventType::RunAborted, Severity::Warning),
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.details = Some(message.clone());
            e
        }
        // Handled by the thread loop before conversion.
        ActivityEvent::Shutdown => LogEntry::new(EventType::RunCompleted, Severity::Info),
    }
}
