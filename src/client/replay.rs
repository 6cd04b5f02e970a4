//! Recorded sessions: replay a captured load test through the listener.
//!
//! A recording is a JSON document with the test identity, its load schedule,
//! and one entry per poll. Each `fetch_test` call advances one poll; metric
//! queries see every sample recorded up to and including the current poll,
//! which is how the remote service answers a query without a time window.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::source::{MetricSource, TestClient};
use crate::client::types::{
    MetricSample, RemoteStatus, ScheduleStep, StandardMetric, TestSnapshot,
};
use crate::core::errors::{LgError, Result};

/// Identity of the recorded test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedTest {
    pub id: u64,
    #[serde(default)]
    pub title: String,
}

/// One recorded poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedTick {
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// New samples that became visible at this poll, as `[timestamp_ms, value]`.
    #[serde(default)]
    pub samples: BTreeMap<StandardMetric, Vec<(i64, f64)>>,
}

/// Whole recording as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecording {
    pub test: RecordedTest,
    #[serde(default)]
    pub schedule: Vec<ScheduleStep>,
    pub ticks: Vec<RecordedTick>,
}

/// Replays a [`SessionRecording`] as if it were the remote service.
#[derive(Debug, Clone)]
pub struct ReplaySession {
    recording: SessionRecording,
    cursor: Option<usize>,
    abort_requested: bool,
}

impl ReplaySession {
    #[must_use]
    pub fn new(recording: SessionRecording) -> Self {
        Self {
            recording,
            cursor: None,
            abort_requested: false,
        }
    }

    /// Parse a recording from JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let recording: SessionRecording = serde_json::from_str(raw)?;
        Ok(Self::new(recording))
    }

    /// Load a recording file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| LgError::io(path, source))?;
        Self::from_json(&raw)
    }

    #[must_use]
    pub fn test_id(&self) -> u64 {
        self.recording.test.id
    }

    #[must_use]
    pub fn recording(&self) -> &SessionRecording {
        &self.recording
    }

    /// Number of polls served so far.
    #[must_use]
    pub fn polls_served(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    #[must_use]
    pub fn abort_requested(&self) -> bool {
        self.abort_requested
    }

    fn check_id(&self, test_id: u64, operation: &'static str) -> Result<()> {
        if test_id == self.recording.test.id {
            Ok(())
        } else {
            Err(LgError::api(
                operation,
                format!(
                    "unknown test id {test_id} (recording holds {})",
                    self.recording.test.id
                ),
            ))
        }
    }
}

impl MetricSource for ReplaySession {
    fn query(
        &self,
        test_id: u64,
        metric: StandardMetric,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<MetricSample>> {
        self.check_id(test_id, "metric query")?;
        let Some(cursor) = self.cursor else {
            return Ok(Vec::new());
        };

        let mut samples: Vec<MetricSample> = self.recording.ticks[..=cursor]
            .iter()
            .filter_map(|tick| tick.samples.get(&metric))
            .flatten()
            .filter(|(ts, _)| from_ms.is_none_or(|from| *ts >= from))
            .filter(|(ts, _)| to_ms.is_none_or(|to| *ts <= to))
            .map(|&(ts, value)| MetricSample::new(metric, ts, value))
            .collect();
        samples.sort_by_key(|s| s.timestamp_ms);
        Ok(samples)
    }
}

impl TestClient for ReplaySession {
    fn load_schedule(&mut self, test_id: u64) -> Result<Vec<ScheduleStep>> {
        self.check_id(test_id, "load schedule")?;
        Ok(self.recording.schedule.clone())
    }

    fn fetch_test(&mut self, test_id: u64) -> Result<TestSnapshot> {
        self.check_id(test_id, "fetch test")?;
        let last = self
            .recording
            .ticks
            .len()
            .checked_sub(1)
            .ok_or_else(|| LgError::api("fetch test", "recording has no ticks"))?;
        let next = self.cursor.map_or(0, |c| (c + 1).min(last));
        self.cursor = Some(next);

        let tick = &self.recording.ticks[next];
        Ok(TestSnapshot {
            id: self.recording.test.id,
            title: self.recording.test.title.clone(),
            status: tick.status,
            public_url: tick.public_url.clone(),
        })
    }

    fn abort_test(&mut self, test_id: u64) -> Result<()> {
        self.check_id(test_id, "abort test")?;
        self.abort_requested = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = r#"{
        "test": {"id": 7, "title": "checkout"},
        "schedule": [{"duration": 5, "users": 50}, {"duration": 10, "users": 100}],
        "ticks": [
            {"status": 1},
            {"status": 2, "public_url": "https://results.example/7",
             "samples": {"USER_LOAD_TIME": [[2000, 410.0], [1000, 400.0]]}},
            {"status": 3, "samples": {"USER_LOAD_TIME": [[3000, 450.0]],
                                      "PROGRESS_PERCENT_TOTAL": [[3000, 100.0]]}}
        ]
    }"#;

    #[test]
    fn queries_before_first_poll_are_empty() {
        let session = ReplaySession::from_json(RECORDING).expect("parse recording");
        let samples = session
            .query(7, StandardMetric::UserLoadTime, None, None)
            .expect("query");
        assert!(samples.is_empty());
    }

    #[test]
    fn polls_advance_and_accumulate_samples_in_order() {
        let mut session = ReplaySession::from_json(RECORDING).expect("parse recording");
        assert_eq!(session.load_schedule(7).expect("schedule").len(), 2);

        let first = session.fetch_test(7).expect("first poll");
        assert_eq!(first.status, RemoteStatus::Initializing);
        let second = session.fetch_test(7).expect("second poll");
        assert_eq!(second.status, RemoteStatus::Running);
        assert_eq!(second.results_url(), Some("https://results.example/7"));

        let samples = session
            .query(7, StandardMetric::UserLoadTime, None, None)
            .expect("query");
        let stamps: Vec<i64> = samples.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![1000, 2000]);

        session.fetch_test(7).expect("third poll");
        let latest = session
            .latest(7, StandardMetric::UserLoadTime)
            .expect("latest")
            .expect("has a sample");
        assert!((latest.value - 450.0).abs() < f64::EPSILON);
    }

    #[test]
    fn last_tick_repeats_once_exhausted() {
        let mut session = ReplaySession::from_json(RECORDING).expect("parse recording");
        for _ in 0..5 {
            session.fetch_test(7).expect("poll");
        }
        assert_eq!(session.polls_served(), 3);
        assert_eq!(
            session.fetch_test(7).expect("poll").status,
            RemoteStatus::Finished
        );
    }

    #[test]
    fn time_window_filters_samples() {
        let mut session = ReplaySession::from_json(RECORDING).expect("parse recording");
        for _ in 0..3 {
            session.fetch_test(7).expect("poll");
        }
        let windowed = session
            .query(7, StandardMetric::UserLoadTime, Some(1500), Some(2500))
            .expect("query");
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].timestamp_ms, 2000);
    }

    #[test]
    fn wrong_test_id_is_an_api_error() {
        let mut session = ReplaySession::from_json(RECORDING).expect("parse recording");
        let err = session.fetch_test(8).expect_err("unknown id");
        assert_eq!(err.code(), "LG-2001");
    }

    #[test]
    fn empty_recording_fails_fetch() {
        let mut session = ReplaySession::from_json(r#"{"test": {"id": 1}, "ticks": []}"#)
            .expect("parse recording");
        assert!(session.fetch_test(1).is_err());
    }

    #[test]
    fn abort_is_recorded() {
        let mut session = ReplaySession::from_json(RECORDING).expect("parse recording");
        assert!(!session.abort_requested());
        session.abort_test(7).expect("abort");
        assert!(session.abort_requested());
    }
}
