//! Bounded dropping window of metric values, deduplicated by timestamp.
//!
//! Metric queries return the whole history each tick, so the window only
//! accepts samples newer than the last one it took. Feeding the same
//! samples twice is a no-op.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::collections::VecDeque;

use crate::client::types::MetricSample;

#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    values: VecDeque<f64>,
    last_timestamp_ms: Option<i64>,
}

impl SampleWindow {
    /// `capacity` of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            last_timestamp_ms: None,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Push every sample newer than the last accepted one, dropping the
    /// oldest values once full. Returns how many were accepted.
    pub fn extend(&mut self, samples: &[MetricSample]) -> usize {
        let mut accepted = 0;
        for sample in samples {
            if self
                .last_timestamp_ms
                .is_some_and(|last| sample.timestamp_ms <= last)
            {
                continue;
            }
            if !sample.value.is_finite() {
                self.last_timestamp_ms = Some(sample.timestamp_ms);
                continue;
            }
            if self.values.len() == self.capacity {
                self.values.pop_front();
            }
            self.values.push_back(sample.value);
            self.last_timestamp_ms = Some(sample.timestamp_ms);
            accepted += 1;
        }
        accepted
    }

    /// Arithmetic mean of the retained values.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    #[must_use]
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.last_timestamp_ms
    }
}
