//! z-score anomaly model.
//!
//! ```text
//!   fit:    mean, stddev of the buffer; threshold = 3 * stddev
//!   refit:  mean' = 0.7 * mean + 0.3 * fresh_mean   (same for stddev)
//!   score:  |value - mean| / stddev      (0 when stddev is 0)
//! ```

use serde::{Deserialize, Serialize};

use super::statistics::mean_and_stddev;

const PRIOR_WEIGHT: f64 = 0.7;
const FRESH_WEIGHT: f64 = 0.3;
const THRESHOLD_SIGMAS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyModel {
    pub mean: f64,
    pub stddev: f64,
    /// Alert threshold in the metric's own units
    pub threshold: f64,
    pub last_update: f64,
}

impl AnomalyModel {
    #[must_use]
    pub fn fit(values: &[f64], now: f64) -> Option<Self> {
        let (mean, stddev) = mean_and_stddev(values)?;
        Some(Self {
            mean,
            stddev,
            threshold: THRESHOLD_SIGMAS * stddev,
            last_update: now,
        })
    }

    /// Blend the model with statistics of `values`.
    #[must_use]
    pub fn refit(&self, values: &[f64], now: f64) -> Self {
        let Some((mean, stddev)) = mean_and_stddev(values) else {
            return *self;
        };
        let stddev = self.stddev * PRIOR_WEIGHT + stddev * FRESH_WEIGHT;
        Self {
            mean: self.mean * PRIOR_WEIGHT + mean * FRESH_WEIGHT,
            stddev,
            threshold: THRESHOLD_SIGMAS * stddev,
            last_update: now,
        }
    }

    #[must_use]
    pub fn score(&self, value: f64) -> f64 {
        if self.stddev == 0.0 {
            0.0
        } else {
            (value - self.mean).abs() / self.stddev
        }
    }
}

/// Stats of the model that flagged an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub mean: f64,
    pub stddev: f64,
}

/// A flagged sample, persisted under `anomaly.<metric>.<stamp>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub score: f64,
    pub timestamp: f64,
    pub threshold: f64,
    pub model_stats: ModelStats,
}
