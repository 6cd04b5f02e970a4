//! Per-run orchestrator driven by the host once per poll.
//!
//! The host calls [`LoadTestListener::on_setup`] once with the load
//! schedule, [`LoadTestListener::on_progress`] for every fresh snapshot, and
//! then exactly one terminal hook. All per-run state lives here; nothing is
//! shared or locked.

#![allow(missing_docs)]

use std::time::Instant;

use crate::build::verdict::{Verdict, VerdictSink};
use crate::client::source::MetricSource;
use crate::client::types::{ScheduleStep, TestSnapshot, peak_users, total_duration_minutes};
use crate::core::config::Config;
use crate::core::errors::{LgError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::logger::console::LoadTestLogger;
use crate::monitor::gate::{DelayConfig, DelayGate};
use crate::monitor::progress::{ProgressTracker, current_percentage, render_progress_bar};
use crate::monitor::state::{MonitoringState, next_state};
use crate::monitor::threshold::{ThresholdConfig, ThresholdSet, ThresholdViolation};

// ──────────────────── options ────────────────────

/// The slice of configuration one listener needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerOptions {
    pub abort_at_failure: bool,
    /// Echo snapshots and threshold checks on the debug channel.
    pub log_replies: bool,
    pub delay: DelayConfig,
    pub thresholds: Vec<ThresholdConfig>,
}

impl From<&Config> for ListenerOptions {
    fn from(config: &Config) -> Self {
        Self {
            abort_at_failure: config.monitor.abort_at_failure,
            log_replies: config.monitor.log_replies,
            delay: config.delay,
            thresholds: config.thresholds.clone(),
        }
    }
}

/// What the host should do after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The verdict is failing and abort-at-failure is set: abort the remote
    /// test and call [`LoadTestListener::on_aborted`].
    AbortRequested { reason: String },
}

impl TickOutcome {
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::AbortRequested { .. })
    }
}

// ──────────────────── listener ────────────────────

pub struct LoadTestListener<L, S> {
    options: ListenerOptions,
    logger: L,
    sink: S,
    activity: Option<ActivityLoggerHandle>,
    state: MonitoringState,
    gate: DelayGate,
    thresholds: ThresholdSet,
    /// Set by `on_setup`; `None` means setup has not happened.
    progress: Option<ProgressTracker>,
    run_start: Option<Instant>,
    results_url: Option<String>,
    abort_raised: bool,
    finished: bool,
}

impl<L: LoadTestLogger, S: VerdictSink> LoadTestListener<L, S> {
    #[must_use]
    pub fn new(options: ListenerOptions, logger: L, sink: S) -> Self {
        let gate = DelayGate::new(options.delay);
        let thresholds = ThresholdSet::new(&options.thresholds);
        Self {
            options,
            logger,
            sink,
            activity: None,
            state: MonitoringState::NotStarted,
            gate,
            thresholds,
            progress: None,
            run_start: None,
            results_url: None,
            abort_raised: false,
            finished: false,
        }
    }

    /// Mirror run events into the activity log.
    #[must_use]
    pub fn with_activity(mut self, handle: ActivityLoggerHandle) -> Self {
        self.activity = Some(handle);
        self
    }

    #[must_use]
    pub fn state(&self) -> MonitoringState {
        self.state
    }

    #[must_use]
    pub fn logger(&self) -> &L {
        &self.logger
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Highest progress percentage recorded this run.
    #[must_use]
    pub fn last_percentage(&self) -> Option<f64> {
        self.progress.as_ref().and_then(ProgressTracker::last_percentage)
    }

    /// Whether a terminal hook has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_parts(self) -> (L, S) {
        (self.logger, self.sink)
    }

    // ──────────────────── hooks ────────────────────

    /// Record the planned schedule. Must be called exactly once, before any
    /// progress tick.
    pub fn on_setup(&mut self, schedule: &[ScheduleStep]) -> Result<()> {
        if self.progress.is_some() {
            return Err(LgError::Lifecycle {
                details: "on_setup called twice".to_string(),
            });
        }
        if self.options.log_replies {
            self.logger.debug(&format!("load schedule: {schedule:?}"));
        }
        let total = total_duration_minutes(schedule);
        self.progress = Some(ProgressTracker::new(total));
        self.emit(ActivityEvent::RunSetup {
            total_minutes: total,
            peak_users: peak_users(schedule),
            thresholds: self.thresholds.len(),
        });
        Ok(())
    }

    /// One tick at the current time.
    pub fn on_progress<M: MetricSource + ?Sized>(
        &mut self,
        snapshot: &TestSnapshot,
        source: &M,
    ) -> Result<TickOutcome> {
        self.on_progress_at(snapshot, source, Instant::now())
    }

    /// One tick with an explicit clock reading.
    pub fn on_progress_at<M: MetricSource + ?Sized>(
        &mut self,
        snapshot: &TestSnapshot,
        source: &M,
        now: Instant,
    ) -> Result<TickOutcome> {
        if self.finished {
            return Err(LgError::Lifecycle {
                details: "on_progress called after a terminal hook".to_string(),
            });
        }
        if self.progress.is_none() {
            return Err(LgError::Lifecycle {
                details: "on_progress called before on_setup".to_string(),
            });
        }
        if self.options.log_replies {
            self.logger.debug(&format!("snapshot: {snapshot:?}"));
        }

        let test_id = snapshot.id;
        let last_state = self.state;
        self.advance(test_id, next_state(self.state, snapshot.status, None));

        if self.state.is_active() {
            if self.run_start.is_none() {
                self.run_start = Some(now);
            }
            let latest = current_percentage(source, test_id)?;
            if let Some(update) = self.progress.as_mut().and_then(|p| p.observe(latest)) {
                self.logger.message(&format!(
                    "Running: {} (~ {:.1} minutes remaining)",
                    render_progress_bar(update.percentage),
                    update.eta_minutes
                ));
            }
        } else if self.state != last_state {
            self.logger.message(&format!("Load test state: {}", self.state));
        }

        if self.results_url.is_none()
            && let Some(url) = snapshot.results_url()
        {
            self.results_url = Some(url.to_string());
            self.logger.message(&format!(
                "Start sending load traffic [{}] {}",
                snapshot.id, snapshot.title
            ));
            self.logger
                .message(&format!("Follow the test progress at URL {url}"));
            self.emit(ActivityEvent::TrafficStarted {
                test_id,
                url: url.to_string(),
            });
        }

        if self.state.is_awaiting_window() {
            let run_start = self.run_start.unwrap_or(now);
            let decision = self.gate.evaluate(source, test_id, run_start, now)?;
            self.advance(
                test_id,
                next_state(self.state, snapshot.status, Some(decision.open)),
            );
            if self.state.is_checking_thresholds() {
                self.logger
                    .message(&format!("Start checking thresholds: {}", decision.reason));
                self.emit(ActivityEvent::GateOpened {
                    test_id,
                    reason: decision.reason,
                });
            }
        }

        let mut outcome = TickOutcome::Continue;
        if self.state.is_checking_thresholds() {
            let check = self.thresholds.check_all(source, test_id);
            for threshold in self.thresholds.iter() {
                self.logger.debug(&format!("Checking {threshold}"));
            }
            for violation in &check.violations {
                self.forward(test_id, violation);
            }
            if let Some(error) = check.error {
                return Err(error);
            }
            let violations = check.violations;

            if !self.abort_raised && self.options.abort_at_failure && self.sink.is_failure() {
                self.abort_raised = true;
                let reason = violations
                    .iter()
                    .rev()
                    .find(|v| v.result.is_failing())
                    .map_or_else(
                        || "build verdict is failing".to_string(),
                        |v| v.reason.clone(),
                    );
                self.emit(ActivityEvent::AbortRequested {
                    test_id,
                    reason: reason.clone(),
                });
                outcome = TickOutcome::AbortRequested { reason };
            }

            let complete = self.progress.as_ref().is_some_and(ProgressTracker::is_complete);
            self.advance(test_id, next_state(self.state, snapshot.status, Some(complete)));
            if self.state != last_state && !self.state.is_checking_thresholds() {
                self.logger.message(&format!("Load test state: {}", self.state));
            }
        }

        Ok(outcome)
    }

    /// The remote test completed.
    pub fn on_success(&mut self) {
        if !self.latch_terminal() {
            return;
        }
        self.logger.message("Load test completed");
        self.emit(ActivityEvent::RunCompleted {
            thresholds_exceeded: self.thresholds.exceeded_count(),
        });
    }

    /// The remote test ended in a failed status.
    pub fn on_failure(&mut self, snapshot: &TestSnapshot) {
        if !self.latch_terminal() {
            return;
        }
        self.logger
            .failure(&format!("Load test failed: {}", snapshot.status));
        self.emit(ActivityEvent::RunFailed {
            status: snapshot.status.to_string(),
        });
    }

    /// The run was aborted on request, ours or the operator's.
    pub fn on_aborted(&mut self) {
        if !self.latch_terminal() {
            return;
        }
        self.logger.message("Load test requested to be aborted");
        self.sink.stop_build();
        self.emit(ActivityEvent::RunAborted);
    }

    /// Fatal error talking to the service or driving the run.
    pub fn on_error(&mut self, error: &LgError) {
        if !self.latch_terminal() {
            return;
        }
        let text = error.to_string();
        self.logger
            .failure(&format!("Load test internal error: {text}"));
        self.sink.mark_as(Verdict::Error, &text);
        self.sink.stop_build();
        self.emit(ActivityEvent::Error {
            code: error.code().to_string(),
            message: text,
        });
    }

    // ──────────────────── internals ────────────────────

    fn advance(&mut self, test_id: u64, next: MonitoringState) {
        if next != self.state {
            self.emit(ActivityEvent::StateChanged {
                test_id,
                from: self.state.to_string(),
                to: next.to_string(),
            });
            self.state = next;
        }
    }

    fn forward(&mut self, test_id: u64, violation: &ThresholdViolation) {
        self.sink.mark_as(violation.result, &violation.reason);
        self.logger.debug(&format!(
            "Threshold {} EXCEEDED: Build marked {}. Reason: {}",
            violation.id,
            violation.result.display_name(),
            violation.reason
        ));
        self.emit(ActivityEvent::ThresholdExceeded {
            test_id,
            threshold_id: violation.id,
            metric: violation.metric.to_string(),
            verdict: violation.result.to_string(),
            observed: violation.observed,
            reason: violation.reason.clone(),
        });
    }

    /// True the first time; later terminal hooks are no-ops.
    fn latch_terminal(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        true
    }

    fn emit(&self, event: ActivityEvent) {
        if let Some(handle) = &self.activity {
            handle.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::build::verdict::BuildVerdict;
    use crate::client::types::{MetricSample, RemoteStatus, StandardMetric};
    use crate::logger::console::MemoryLogger;
    use crate::monitor::gate::DelayUnit;

    #[derive(Default)]
    struct Metrics(HashMap<StandardMetric, Vec<MetricSample>>);

    impl Metrics {
        fn push(&mut self, metric: StandardMetric, ts: i64, value: f64) {
            self.0
                .entry(metric)
                .or_default()
                .push(MetricSample::new(metric, ts, value));
        }
    }

    impl MetricSource for Metrics {
        fn query(
            &self,
            _test_id: u64,
            metric: StandardMetric,
            _from_ms: Option<i64>,
            _to_ms: Option<i64>,
        ) -> Result<Vec<MetricSample>> {
            Ok(self.0.get(&metric).cloned().unwrap_or_default())
        }
    }

    struct Failing;

    impl MetricSource for Failing {
        fn query(
            &self,
            _test_id: u64,
            _metric: StandardMetric,
            _from_ms: Option<i64>,
            _to_ms: Option<i64>,
        ) -> Result<Vec<MetricSample>> {
            Err(LgError::api("query", "connection reset"))
        }
    }

    fn snapshot(status: RemoteStatus, url: Option<&str>) -> TestSnapshot {
        TestSnapshot {
            id: 42,
            title: "checkout".to_string(),
            status,
            public_url: url.map(str::to_string),
        }
    }

    fn listener(options: ListenerOptions) -> LoadTestListener<MemoryLogger, BuildVerdict> {
        LoadTestListener::new(options, MemoryLogger::new(), BuildVerdict::new())
    }

    fn schedule() -> Vec<ScheduleStep> {
        vec![
            ScheduleStep {
                duration: 5,
                users: 50,
            },
            ScheduleStep {
                duration: 10,
                users: 100,
            },
            ScheduleStep {
                duration: 5,
                users: 0,
            },
        ]
    }

    #[test]
    fn progress_before_setup_is_a_lifecycle_error() {
        let mut l = listener(ListenerOptions::default());
        let err = l
            .on_progress(&snapshot(RemoteStatus::Running, None), &Metrics::default())
            .unwrap_err();
        assert_eq!(err.code(), "LG-2002");
    }

    #[test]
    fn setup_twice_is_rejected() {
        let mut l = listener(ListenerOptions::default());
        l.on_setup(&schedule()).unwrap();
        assert!(l.on_setup(&schedule()).is_err());
    }

    #[test]
    fn progress_line_reports_eta() {
        let mut l = listener(ListenerOptions::default());
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        metrics.push(StandardMetric::ProgressPercentTotal, 1000, 25.0);

        l.on_progress(&snapshot(RemoteStatus::Running, None), &metrics)
            .unwrap();
        let lines: Vec<&str> = l.logger().messages().collect();
        assert_eq!(
            lines,
            ["Running: [#####---------------] 25% (~ 15.0 minutes remaining)"]
        );

        // Same value again: nothing new.
        l.on_progress(&snapshot(RemoteStatus::Running, None), &metrics)
            .unwrap();
        assert_eq!(l.logger().count_containing("Running:"), 1);
    }

    #[test]
    fn state_line_only_for_inactive_states() {
        let mut l = listener(ListenerOptions::default());
        l.on_setup(&schedule()).unwrap();
        let metrics = Metrics::default();
        l.on_progress(&snapshot(RemoteStatus::Queued, None), &metrics)
            .unwrap();
        assert_eq!(l.state(), MonitoringState::NotStarted);
        assert!(l.logger().lines().is_empty());

        l.on_progress(&snapshot(RemoteStatus::Running, None), &metrics)
            .unwrap();
        assert_eq!(l.state(), MonitoringState::Running);
        assert_eq!(l.logger().count_containing("Load test state"), 0);

        l.on_progress(&snapshot(RemoteStatus::Finished, None), &metrics)
            .unwrap();
        assert_eq!(l.state(), MonitoringState::Finished);
        assert_eq!(
            l.logger().messages().last(),
            Some("Load test state: FINISHED")
        );
    }

    #[test]
    fn traffic_lines_emitted_once() {
        let mut l = listener(ListenerOptions::default());
        l.on_setup(&schedule()).unwrap();
        let metrics = Metrics::default();
        let snap = snapshot(RemoteStatus::Running, Some("https://app.example/t/42"));
        l.on_progress(&snap, &metrics).unwrap();
        l.on_progress(&snap, &metrics).unwrap();
        assert_eq!(
            l.logger().count_containing("Start sending load traffic [42] checkout"),
            1
        );
        assert_eq!(
            l.logger()
                .count_containing("Follow the test progress at URL https://app.example/t/42"),
            1
        );
    }

    #[test]
    fn time_gate_opens_after_delay() {
        let mut l = listener(ListenerOptions {
            delay: DelayConfig {
                unit: DelayUnit::Seconds,
                value: 30,
            },
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let metrics = Metrics::default();
        let t0 = Instant::now();
        let running = snapshot(RemoteStatus::Running, None);

        l.on_progress_at(&running, &metrics, t0).unwrap();
        l.on_progress_at(&running, &metrics, t0 + Duration::from_secs(10))
            .unwrap();
        assert_eq!(l.state(), MonitoringState::AwaitingThresholdWindow);
        l.on_progress_at(&running, &metrics, t0 + Duration::from_secs(29))
            .unwrap();
        assert_eq!(l.state(), MonitoringState::AwaitingThresholdWindow);
        l.on_progress_at(&running, &metrics, t0 + Duration::from_secs(30))
            .unwrap();
        assert_eq!(l.state(), MonitoringState::CheckingThresholds);
        assert_eq!(
            l.logger().count_containing(
                "Start checking thresholds: Passed 30 seconds after running test start (current=30 seconds)"
            ),
            1
        );
    }

    #[test]
    fn user_gate_uses_active_clients() {
        let mut l = listener(ListenerOptions {
            delay: DelayConfig {
                unit: DelayUnit::Users,
                value: 50,
            },
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        let running = snapshot(RemoteStatus::Running, None);
        l.on_progress(&running, &metrics).unwrap();
        l.on_progress(&running, &metrics).unwrap();
        assert_eq!(l.state(), MonitoringState::AwaitingThresholdWindow);

        metrics.push(StandardMetric::ClientsActive, 1000, 50.0);
        l.on_progress(&running, &metrics).unwrap();
        assert_eq!(l.state(), MonitoringState::AwaitingThresholdWindow);

        metrics.push(StandardMetric::ClientsActive, 2000, 51.0);
        l.on_progress(&running, &metrics).unwrap();
        assert_eq!(l.state(), MonitoringState::CheckingThresholds);
        assert_eq!(
            l.logger()
                .count_containing("Passed 50 users (current=51 users)"),
            1
        );
    }

    #[test]
    fn unstable_violation_marks_without_abort() {
        let mut l = listener(ListenerOptions {
            abort_at_failure: true,
            thresholds: vec![ThresholdConfig::new(1, StandardMetric::UserLoadTime, 500.0)],
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        metrics.push(StandardMetric::UserLoadTime, 1000, 600.0);
        let running = snapshot(RemoteStatus::Running, None);

        for _ in 0..4 {
            let outcome = l.on_progress(&running, &metrics).unwrap();
            assert_eq!(outcome, TickOutcome::Continue);
        }
        assert_eq!(l.sink().verdict(), Verdict::Unstable);
        assert_eq!(l.sink().marks().len(), 1, "forwarded once");
        assert!(l.sink().reason().unwrap().contains("600>500"));
        assert!(!l.sink().is_failure());
    }

    #[test]
    fn abort_raised_once_after_all_thresholds() {
        let mut l = listener(ListenerOptions {
            abort_at_failure: true,
            thresholds: vec![
                ThresholdConfig::new(1, StandardMetric::UserLoadTime, 500.0)
                    .with_result(Verdict::Failure),
                ThresholdConfig::new(2, StandardMetric::FailureRate, 5.0)
                    .with_result(Verdict::Failure),
            ],
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        metrics.push(StandardMetric::UserLoadTime, 1000, 600.0);
        metrics.push(StandardMetric::FailureRate, 1000, 9.0);
        let running = snapshot(RemoteStatus::Running, None);

        // Tick 1 starts the run; tick 2 opens the zero-delay gate and checks.
        let outcome = l.on_progress(&running, &metrics).unwrap();
        assert_eq!(outcome, TickOutcome::Continue);
        let outcome = l.on_progress(&running, &metrics).unwrap();
        assert!(outcome.is_abort());
        assert_eq!(l.sink().marks().len(), 2, "both thresholds evaluated first");

        let outcome = l.on_progress(&running, &metrics).unwrap();
        assert_eq!(outcome, TickOutcome::Continue);
    }

    #[test]
    fn failing_verdict_without_abort_flag_keeps_running() {
        let mut l = listener(ListenerOptions {
            abort_at_failure: false,
            thresholds: vec![
                ThresholdConfig::new(1, StandardMetric::FailureRate, 5.0)
                    .with_result(Verdict::Failure),
            ],
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        metrics.push(StandardMetric::FailureRate, 1000, 9.0);
        let running = snapshot(RemoteStatus::Running, None);

        for _ in 0..4 {
            let outcome = l.on_progress(&running, &metrics).unwrap();
            assert_eq!(outcome, TickOutcome::Continue);
        }
        assert_eq!(l.state(), MonitoringState::CheckingThresholds);
        assert!(l.sink().is_failure());
        assert_eq!(l.sink().verdict(), Verdict::Failure);
        assert!(!l.sink().stop_requested());
    }

    /// Healthy metrics except one that always fails.
    struct FailsOn(Metrics, StandardMetric);

    impl MetricSource for FailsOn {
        fn query(
            &self,
            test_id: u64,
            metric: StandardMetric,
            from_ms: Option<i64>,
            to_ms: Option<i64>,
        ) -> Result<Vec<MetricSample>> {
            if metric == self.1 {
                return Err(LgError::api("query", "connection reset"));
            }
            self.0.query(test_id, metric, from_ms, to_ms)
        }
    }

    #[test]
    fn violation_reaches_sink_when_a_later_query_fails() {
        let mut l = listener(ListenerOptions {
            thresholds: vec![
                ThresholdConfig::new(1, StandardMetric::UserLoadTime, 500.0),
                ThresholdConfig::new(2, StandardMetric::FailureRate, 5.0)
                    .with_result(Verdict::Failure),
            ],
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        metrics.push(StandardMetric::UserLoadTime, 1000, 600.0);
        let source = FailsOn(metrics, StandardMetric::FailureRate);
        let running = snapshot(RemoteStatus::Running, None);

        l.on_progress(&running, &source).unwrap();
        let err = l.on_progress(&running, &source).unwrap_err();
        assert_eq!(err.code(), "LG-2001");

        let verdicts: Vec<Verdict> = l.sink().marks().iter().map(|m| m.verdict).collect();
        assert_eq!(verdicts, [Verdict::Unstable], "threshold 1 forwarded before the error");
        assert!(l.sink().reason().unwrap().contains("600>500"));

        l.on_error(&err);
        assert_eq!(l.sink().verdict(), Verdict::Error);
        assert_eq!(l.sink().marks().len(), 2);
    }

    #[test]
    fn completion_while_checking_finishes() {
        let mut l = listener(ListenerOptions {
            thresholds: vec![ThresholdConfig::new(1, StandardMetric::UserLoadTime, 500.0)],
            ..ListenerOptions::default()
        });
        l.on_setup(&schedule()).unwrap();
        let mut metrics = Metrics::default();
        metrics.push(StandardMetric::UserLoadTime, 1000, 100.0);
        let running = snapshot(RemoteStatus::Running, None);
        l.on_progress(&running, &metrics).unwrap();
        l.on_progress(&running, &metrics).unwrap();
        assert_eq!(l.state(), MonitoringState::CheckingThresholds);

        metrics.push(StandardMetric::ProgressPercentTotal, 2000, 100.0);
        l.on_progress(&running, &metrics).unwrap();
        assert_eq!(l.state(), MonitoringState::Finished);
        assert_eq!(
            l.logger().messages().last(),
            Some("Load test state: FINISHED")
        );
        l.on_success();
        assert_eq!(l.sink().verdict(), Verdict::Success);
        assert_eq!(l.logger().messages().last(), Some("Load test completed"));
    }

    #[test]
    fn metric_errors_propagate() {
        let mut l = listener(ListenerOptions::default());
        l.on_setup(&schedule()).unwrap();
        let err = l
            .on_progress(&snapshot(RemoteStatus::Running, None), &Failing)
            .unwrap_err();
        assert_eq!(err.code(), "LG-2001");
    }

    #[test]
    fn error_hook_marks_error_and_stops() {
        let mut l = listener(ListenerOptions::default());
        l.on_error(&LgError::api("fetch_test", "503"));
        assert_eq!(l.sink().verdict(), Verdict::Error);
        assert!(l.sink().stop_requested());
        let failures: Vec<&str> = l.logger().failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Load test internal error: [LG-2001]"));
    }

    #[test]
    fn terminal_hooks_are_latched() {
        let mut l = listener(ListenerOptions::default());
        l.on_aborted();
        l.on_aborted();
        l.on_failure(&snapshot(RemoteStatus::TimedOut, None));
        assert!(l.is_finished());
        assert!(l.sink().stop_requested());
        assert_eq!(l.logger().lines().len(), 1);
        assert_eq!(
            l.logger().messages().next(),
            Some("Load test requested to be aborted")
        );
    }

    #[test]
    fn failure_hook_uses_failure_channel() {
        let mut l = listener(ListenerOptions::default());
        l.on_failure(&snapshot(RemoteStatus::AbortedScriptError, None));
        let failures: Vec<&str> = l.logger().failures().collect();
        assert_eq!(failures, ["Load test failed: ABORTED_SCRIPT_ERROR"]);
        assert!(!l.sink().stop_requested());
    }
}
