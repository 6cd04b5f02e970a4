//! Narrow interfaces to the remote load testing service.
//!
//! The listener only ever needs [`MetricSource`]; hosts that drive the
//! polling loop themselves also need [`TestClient`].

use crate::client::types::{MetricSample, ScheduleStep, StandardMetric, TestSnapshot};
use crate::core::errors::Result;

/// Supplies time-ordered metric samples for a test.
pub trait MetricSource {
    /// Samples of `metric` for `test_id`, ascending by timestamp.
    ///
    /// `from_ms`/`to_ms` bound the window (inclusive) when given. An empty
    /// result means "no data yet" and is not an error.
    fn query(
        &self,
        test_id: u64,
        metric: StandardMetric,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<MetricSample>>;

    /// Most recent sample of `metric`, if any.
    fn latest(&self, test_id: u64, metric: StandardMetric) -> Result<Option<MetricSample>> {
        Ok(self.query(test_id, metric, None, None)?.last().copied())
    }
}

/// Full client surface used by the polling driver.
pub trait TestClient: MetricSource {
    /// Planned load schedule of the test.
    fn load_schedule(&mut self, test_id: u64) -> Result<Vec<ScheduleStep>>;

    /// Current status of the test.
    fn fetch_test(&mut self, test_id: u64) -> Result<TestSnapshot>;

    /// Ask the service to stop the running test.
    fn abort_test(&mut self, test_id: u64) -> Result<()>;
}

impl<T: MetricSource + ?Sized> MetricSource for &T {
    fn query(
        &self,
        test_id: u64,
        metric: StandardMetric,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<MetricSample>> {
        (**self).query(test_id, metric, from_ms, to_ms)
    }
}
