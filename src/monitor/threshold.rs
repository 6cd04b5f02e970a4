//! Threshold rules: accumulate samples of one metric, compare against a
//! bound, and latch a verdict the first time the bound is crossed.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::build::verdict::Verdict;
use crate::client::source::MetricSource;
use crate::client::types::{MetricSample, StandardMetric};
use crate::core::errors::{LgError, Result};
use crate::monitor::window::SampleWindow;

// ──────────────────── operator ────────────────────

/// Strict comparison between the accumulated value and the bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    #[default]
    GreaterThan,
    LessThan,
}

impl Operator {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
        }
    }

    /// `value <op> bound`.
    #[must_use]
    pub fn eval(self, value: f64, bound: f64) -> bool {
        match self {
            Self::GreaterThan => value > bound,
            Self::LessThan => value < bound,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GreaterThan => write!(f, "greaterThan"),
            Self::LessThan => write!(f, "lessThan"),
        }
    }
}

// ──────────────────── configuration ────────────────────

/// One configured threshold rule, as read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub id: u32,
    #[serde(default = "default_metric")]
    pub metric: StandardMetric,
    #[serde(default)]
    pub operator: Operator,
    /// Bound compared against the accumulated value.
    pub value: f64,
    /// Verdict handed to the build when violated.
    #[serde(default = "default_result")]
    pub result: Verdict,
    /// Number of most recent samples averaged; 1 means latest sample wins.
    #[serde(default = "default_window")]
    pub window: usize,
}

const fn default_metric() -> StandardMetric {
    StandardMetric::UserLoadTime
}

const fn default_result() -> Verdict {
    Verdict::Unstable
}

const fn default_window() -> usize {
    1
}

impl ThresholdConfig {
    /// Rule with default operator, verdict, and window.
    #[must_use]
    pub fn new(id: u32, metric: StandardMetric, value: f64) -> Self {
        Self {
            id,
            metric,
            operator: Operator::default(),
            value,
            result: default_result(),
            window: default_window(),
        }
    }

    #[must_use]
    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: Verdict) -> Self {
        self.result = result;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

// ──────────────────── threshold ────────────────────

/// A violation ready to forward to the verdict sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdViolation {
    pub id: u32,
    pub metric: StandardMetric,
    pub result: Verdict,
    pub observed: f64,
    pub reason: String,
}

/// Runtime state of one rule for one run.
#[derive(Debug, Clone)]
pub struct Threshold {
    config: ThresholdConfig,
    window: SampleWindow,
    observed: Option<f64>,
    violation: Option<ThresholdViolation>,
    forwarded: bool,
}

impl Threshold {
    #[must_use]
    pub fn new(config: ThresholdConfig) -> Self {
        let window = SampleWindow::new(config.window);
        Self {
            config,
            window,
            observed: None,
            violation: None,
            forwarded: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.config.id
    }

    #[must_use]
    pub fn metric(&self) -> StandardMetric {
        self.config.metric
    }

    #[must_use]
    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Current accumulated value (window mean).
    #[must_use]
    pub fn observed(&self) -> Option<f64> {
        self.observed
    }

    /// Fold in the latest query result. Samples already seen are ignored,
    /// and an empty slice leaves the state unchanged. The first time the
    /// accumulated value satisfies the operator the violation latches.
    pub fn accumulate(&mut self, samples: &[MetricSample]) {
        if self.window.extend(samples) == 0 {
            return;
        }
        self.observed = self.window.mean();

        if self.violation.is_some() {
            return;
        }
        if let Some(value) = self.observed
            && self.config.operator.eval(value, self.config.value)
        {
            self.violation = Some(ThresholdViolation {
                id: self.config.id,
                metric: self.config.metric,
                result: self.config.result,
                observed: value,
                reason: self.format_reason(value),
            });
        }
    }

    /// Sticky: once true, stays true for the rest of the run.
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.violation.is_some()
    }

    /// Verdict to apply once exceeded.
    #[must_use]
    pub fn result(&self) -> Verdict {
        self.config.result
    }

    /// Explanation captured at the moment of violation.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.violation.as_ref().map(|v| v.reason.as_str())
    }

    /// The violation, handed out once per run.
    pub fn take_new_violation(&mut self) -> Option<ThresholdViolation> {
        if self.forwarded {
            return None;
        }
        let violation = self.violation.clone()?;
        self.forwarded = true;
        Some(violation)
    }

    /// Query this rule's metric and accumulate the result.
    pub fn check<M: MetricSource + ?Sized>(&mut self, source: &M, test_id: u64) -> Result<()> {
        let samples = source.query(test_id, self.config.metric, None, None)?;
        self.accumulate(&samples);
        Ok(())
    }

    fn format_reason(&self, value: f64) -> String {
        format!(
            "Threshold {}: {} {}{}{} (window={})",
            self.config.id,
            self.config.metric,
            format_value(value),
            self.config.operator.symbol(),
            format_value(self.config.value),
            self.window.len(),
        )
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Threshold {}: {} {} {} -> {} (observed=",
            self.config.id,
            self.config.metric,
            self.config.operator.symbol(),
            format_value(self.config.value),
            self.config.result,
        )?;
        match self.observed {
            Some(v) => write!(f, "{}", format_value(v))?,
            None => write!(f, "n/a")?,
        }
        write!(
            f,
            ", window={}/{}{})",
            self.window.len(),
            self.window.capacity(),
            if self.is_exceeded() { ", EXCEEDED" } else { "" }
        )
    }
}

/// Whole numbers without decimals, everything else with two.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

// ──────────────────── threshold set ────────────────────

/// Outcome of one pass over a [`ThresholdSet`].
#[derive(Debug, Default)]
pub struct ThresholdCheck {
    /// Violations new this pass, in configuration order.
    pub violations: Vec<ThresholdViolation>,
    /// First metric query failure of the pass.
    pub error: Option<LgError>,
}

impl ThresholdCheck {
    /// The violations, or the query error if one occurred.
    pub fn into_result(self) -> Result<Vec<ThresholdViolation>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.violations),
        }
    }
}

/// Configured thresholds, evaluated together in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    #[must_use]
    pub fn new(configs: &[ThresholdConfig]) -> Self {
        Self {
            thresholds: configs.iter().cloned().map(Threshold::new).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.thresholds.iter()
    }

    /// Check every threshold in order. Neither a violation nor a failed
    /// query stops the pass, so violations found on other metrics are still
    /// handed out. The first query error is kept in the result.
    pub fn check_all<M: MetricSource + ?Sized>(
        &mut self,
        source: &M,
        test_id: u64,
    ) -> ThresholdCheck {
        let mut check = ThresholdCheck::default();
        for threshold in &mut self.thresholds {
            if let Err(error) = threshold.check(source, test_id) {
                check.error.get_or_insert(error);
            }
            if let Some(violation) = threshold.take_new_violation() {
                check.violations.push(violation);
            }
        }
        check
    }

    /// Number of thresholds that have been exceeded this run.
    #[must_use]
    pub fn exceeded_count(&self) -> usize {
        self.thresholds.iter().filter(|t| t.is_exceeded()).count()
    }
}
