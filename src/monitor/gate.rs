//! Threshold-window gate: decides when warm-up is over and threshold
//! checking may begin, either after a fixed time since the test started
//! producing load or once enough virtual users are active.

#![allow(missing_docs)]

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::client::source::MetricSource;
use crate::client::types::StandardMetric;
use crate::core::errors::Result;

/// What the delay magnitude counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    /// Seconds since the run left NOT_STARTED.
    #[default]
    Seconds,
    /// Concurrently active virtual users.
    Users,
}

impl fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds => write!(f, "seconds"),
            Self::Users => write!(f, "users"),
        }
    }
}

/// Warm-up policy for threshold checking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub unit: DelayUnit,
    pub value: u32,
}

/// Gate outcome with the explanation logged when it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub open: bool,
    pub reason: String,
}

/// Evaluates a [`DelayConfig`] against the current run.
#[derive(Debug, Clone, Copy)]
pub struct DelayGate {
    config: DelayConfig,
}

impl DelayGate {
    #[must_use]
    pub const fn new(config: DelayConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> DelayConfig {
        self.config
    }

    /// Evaluate the gate for this tick. Only the user-based policy touches
    /// the metric source.
    pub fn evaluate<M: MetricSource + ?Sized>(
        &self,
        source: &M,
        test_id: u64,
        run_start: Instant,
        now: Instant,
    ) -> Result<GateDecision> {
        match self.config.unit {
            DelayUnit::Seconds => Ok(self.evaluate_elapsed(now.saturating_duration_since(run_start))),
            DelayUnit::Users => {
                let active = source
                    .latest(test_id, StandardMetric::ClientsActive)?
                    .map(|s| s.value);
                Ok(self.evaluate_users(active))
            }
        }
    }

    /// Time policy: open once `elapsed >= value` seconds.
    #[must_use]
    pub fn evaluate_elapsed(&self, elapsed: Duration) -> GateDecision {
        let bound = Duration::from_secs(u64::from(self.config.value));
        GateDecision {
            open: elapsed >= bound,
            reason: format!(
                "Passed {} seconds after running test start (current={} seconds)",
                self.config.value,
                elapsed.as_secs()
            ),
        }
    }

    /// User policy: open once the active-user count strictly exceeds `value`.
    /// Fractional samples are truncated to whole users. No sample counts as
    /// zero users.
    #[must_use]
    pub fn evaluate_users(&self, active: Option<f64>) -> GateDecision {
        let active = active.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let current = active as u64;
        GateDecision {
            open: current > u64::from(self.config.value),
            reason: format!(
                "Passed {} users (current={current} users)",
                self.config.value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::MetricSample;

    struct ActiveClients(Vec<f64>);

    impl MetricSource for ActiveClients {
        fn query(
            &self,
            _test_id: u64,
            metric: StandardMetric,
            _from_ms: Option<i64>,
            _to_ms: Option<i64>,
        ) -> Result<Vec<MetricSample>> {
            assert_eq!(metric, StandardMetric::ClientsActive);
            Ok(self
                .0
                .iter()
                .zip(0_i64..)
                .map(|(&v, ts)| MetricSample::new(metric, ts * 1000, v))
                .collect())
        }
    }

    fn seconds(value: u32) -> DelayGate {
        DelayGate::new(DelayConfig {
            unit: DelayUnit::Seconds,
            value,
        })
    }

    fn users(value: u32) -> DelayGate {
        DelayGate::new(DelayConfig {
            unit: DelayUnit::Users,
            value,
        })
    }

    #[test]
    fn time_gate_boundary() {
        let gate = seconds(30);
        assert!(!gate.evaluate_elapsed(Duration::from_millis(29_999)).open);
        assert!(gate.evaluate_elapsed(Duration::from_millis(30_000)).open);
        assert!(gate.evaluate_elapsed(Duration::from_secs(31)).open);
    }

    #[test]
    fn zero_delay_opens_immediately() {
        assert!(seconds(0).evaluate_elapsed(Duration::ZERO).open);
    }

    #[test]
    fn time_gate_reason_reports_elapsed() {
        let decision = seconds(30).evaluate_elapsed(Duration::from_secs(42));
        assert_eq!(
            decision.reason,
            "Passed 30 seconds after running test start (current=42 seconds)"
        );
    }

    #[test]
    fn user_gate_is_strict() {
        let gate = users(50);
        assert!(!gate.evaluate_users(Some(50.0)).open);
        assert!(gate.evaluate_users(Some(51.0)).open);
        assert_eq!(
            gate.evaluate_users(Some(51.0)).reason,
            "Passed 50 users (current=51 users)"
        );
    }

    #[test]
    fn fractional_users_compare_as_whole_users() {
        let gate = users(50);
        let decision = gate.evaluate_users(Some(50.5));
        assert!(!decision.open, "50.5 active clients is still 50 users");
        let decision = gate.evaluate_users(Some(51.7));
        assert!(decision.open);
        assert_eq!(decision.reason, "Passed 50 users (current=51 users)");
    }

    #[test]
    fn missing_user_samples_count_as_zero() {
        let decision = users(0).evaluate_users(None);
        assert!(!decision.open);
        assert_eq!(decision.reason, "Passed 0 users (current=0 users)");
    }

    #[test]
    fn evaluate_uses_latest_active_clients_sample() {
        let gate = users(10);
        let start = Instant::now();
        let source = ActiveClients(vec![20.0, 5.0]);
        let decision = gate.evaluate(&source, 1, start, start).expect("evaluate");
        assert!(!decision.open, "latest sample (5) must win");

        let source = ActiveClients(vec![5.0, 11.0]);
        let decision = gate.evaluate(&source, 1, start, start).expect("evaluate");
        assert!(decision.open);
    }

    #[test]
    fn evaluate_time_policy_ignores_source() {
        let gate = seconds(1);
        let start = Instant::now();
        let source = ActiveClients(Vec::new());
        assert!(
            !gate
                .evaluate(&source, 1, start, start + Duration::from_millis(999))
                .expect("evaluate")
                .open
        );
        assert!(
            gate.evaluate(&source, 1, start, start + Duration::from_secs(1))
                .expect("evaluate")
                .open
        );
    }

    #[test]
    fn delay_config_deserializes_from_toml() {
        let cfg: DelayConfig = toml::from_str("unit = \"users\"\nvalue = 25").expect("parse");
        assert_eq!(cfg.unit, DelayUnit::Users);
        assert_eq!(cfg.value, 25);
    }
}
