//! Progress tracking: monotonic percentage, ETA against the planned schedule,
//! and the text progress bar shown while the test runs.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use crate::client::source::MetricSource;
use crate::client::types::StandardMetric;
use crate::core::errors::Result;

/// Below the valid range so the first real sample always advances.
const NO_PROGRESS: f64 = -1.0;
const BAR_WIDTH: usize = 20;

/// A progress advance worth reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub percentage: f64,
    /// Estimated minutes left on the planned schedule.
    pub eta_minutes: f64,
}

/// Records the highest progress percentage seen in a run.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_minutes: u64,
    last_percentage: f64,
}

impl ProgressTracker {
    /// `total_minutes` is the sum of the load schedule's step durations.
    #[must_use]
    pub fn new(total_minutes: u64) -> Self {
        Self {
            total_minutes,
            last_percentage: NO_PROGRESS,
        }
    }

    #[must_use]
    pub fn total_minutes(&self) -> u64 {
        self.total_minutes
    }

    /// Feed the latest reading. Returns an update only when the percentage
    /// strictly exceeds everything recorded before. Negative and NaN
    /// readings are ignored.
    pub fn observe(&mut self, latest: Option<f64>) -> Option<ProgressUpdate> {
        let percentage = latest.filter(|p| *p >= 0.0)?;
        if percentage <= self.last_percentage {
            return None;
        }
        self.last_percentage = percentage;
        Some(ProgressUpdate {
            percentage,
            eta_minutes: eta_minutes(self.total_minutes, percentage),
        })
    }

    /// Highest recorded percentage, if any sample arrived yet.
    #[must_use]
    pub fn last_percentage(&self) -> Option<f64> {
        (self.last_percentage > NO_PROGRESS).then_some(self.last_percentage)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.last_percentage >= 100.0
    }
}

/// Latest value of the progress metric, or `None` before the first sample.
pub fn current_percentage<M: MetricSource + ?Sized>(
    source: &M,
    test_id: u64,
) -> Result<Option<f64>> {
    Ok(source
        .latest(test_id, StandardMetric::ProgressPercentTotal)?
        .map(|s| s.value))
}

/// `total * (100 - pct) / 100`, with the percentage clamped to `[0, 100]`.
#[must_use]
pub fn eta_minutes(total_minutes: u64, percentage: f64) -> f64 {
    let pct = percentage.clamp(0.0, 100.0);
    total_minutes as f64 * (100.0 - pct) / 100.0
}

/// Fixed-width text bar, e.g. `[#####---------------] 25%`.
#[must_use]
pub fn render_progress_bar(percentage: f64) -> String {
    let pct = if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!(
        "[{}{}] {pct:.0}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}
