//! Reference host: polls a [`TestClient`] and feeds the listener until the
//! run reaches a terminal outcome.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::build::verdict::{BuildVerdict, Verdict};
use crate::client::source::TestClient;
use crate::client::types::RemoteStatus;
use crate::core::config::MonitorConfig;
use crate::core::errors::{LgError, Result};
use crate::logger::console::LoadTestLogger;
use crate::monitor::state::MonitoringState;
use crate::runner::listener::{LoadTestListener, TickOutcome};

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed { status: RemoteStatus },
    Aborted { reason: String },
    Errored { code: String, message: String },
}

/// Everything a host needs after the run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub test_id: u64,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub verdict: Verdict,
    pub reason: Option<String>,
    pub final_state: MonitoringState,
    pub ticks: usize,
    pub thresholds_exceeded: usize,
    pub stop_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    /// Upper bound on polls; exceeding it is a runtime error.
    pub max_ticks: Option<usize>,
}

impl From<&MonitorConfig> for MonitorOptions {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_ticks: None,
        }
    }
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

pub struct TestMonitor<C, L> {
    client: C,
    listener: LoadTestListener<L, BuildVerdict>,
    options: MonitorOptions,
    abort_flag: Option<Arc<AtomicBool>>,
    ticks: usize,
}

impl<C: TestClient, L: LoadTestLogger> TestMonitor<C, L> {
    #[must_use]
    pub fn new(
        client: C,
        listener: LoadTestListener<L, BuildVerdict>,
        options: MonitorOptions,
    ) -> Self {
        Self {
            client,
            listener,
            options,
            abort_flag: None,
            ticks: 0,
        }
    }

    /// Abort the remote test once `flag` becomes true (e.g. on SIGINT).
    #[must_use]
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Monitor `test_id` to completion. Errors are routed through
    /// `on_error` and reported as [`RunOutcome::Errored`].
    pub fn run(mut self, test_id: u64) -> (RunReport, L) {
        let outcome = match self.drive(test_id) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.listener.on_error(&error);
                RunOutcome::Errored {
                    code: error.code().to_string(),
                    message: error.to_string(),
                }
            }
        };

        let final_state = self.listener.state();
        let thresholds_exceeded = self.listener.thresholds().exceeded_count();
        let (logger, sink) = self.listener.into_parts();
        let report = RunReport {
            test_id,
            outcome,
            verdict: sink.verdict(),
            reason: sink.reason().map(str::to_string),
            final_state,
            ticks: self.ticks,
            thresholds_exceeded,
            stop_requested: sink.stop_requested(),
        };
        (report, logger)
    }

    fn drive(&mut self, test_id: u64) -> Result<RunOutcome> {
        let schedule = self.client.load_schedule(test_id)?;
        self.listener.on_setup(&schedule)?;

        loop {
            if self.abort_flag.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
                return self.abort(test_id, "interrupted".to_string());
            }
            if let Some(max) = self.options.max_ticks
                && self.ticks >= max
            {
                return Err(LgError::Runtime {
                    details: format!("test {test_id} still running after {max} polls"),
                });
            }

            let snapshot = self.client.fetch_test(test_id)?;
            self.ticks += 1;

            if let TickOutcome::AbortRequested { reason } =
                self.listener.on_progress(&snapshot, &self.client)?
            {
                return self.abort(test_id, reason);
            }

            if snapshot.status.is_completed() {
                self.listener.on_success();
                return Ok(RunOutcome::Succeeded);
            }
            if snapshot.status.is_failed() {
                self.listener.on_failure(&snapshot);
                return Ok(RunOutcome::Failed {
                    status: snapshot.status,
                });
            }

            if !self.options.poll_interval.is_zero() {
                thread::sleep(self.options.poll_interval);
            }
        }
    }

    fn abort(&mut self, test_id: u64, reason: String) -> Result<RunOutcome> {
        self.client.abort_test(test_id)?;
        self.listener.on_aborted();
        Ok(RunOutcome::Aborted { reason })
    }
}
