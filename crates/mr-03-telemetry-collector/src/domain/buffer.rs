//! Bounded per-metric sample buffer.

use std::collections::VecDeque;

/// Recent samples of one metric, oldest first. Pushing past the capacity
/// drops the oldest sample.
#[derive(Debug, Clone)]
pub struct MetricBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl MetricBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, value: f64) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Keep only the most recent `keep` samples.
    pub fn truncate_oldest(&mut self, keep: usize) {
        let excess = self.samples.len().saturating_sub(keep);
        self.samples.drain(..excess);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// The last `n` samples, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<f64> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
