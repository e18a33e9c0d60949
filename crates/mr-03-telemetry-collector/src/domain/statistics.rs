//! Summary statistics over a sample set.

use serde::{Deserialize, Serialize};

/// Statistics of one metric over one window.
///
/// Dispersion needs two samples, quartiles four, tail percentiles ten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p25: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p75: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p90: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99: Option<f64>,
}

impl Statistics {
    /// `None` for an empty sample set.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let mean = sum / count as f64;

        let variance = (count > 1).then(|| sample_variance(&sorted, mean));
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
        let quartiles = count >= 4;
        let tails = count >= 10;

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            sum,
            mean,
            stddev: variance.map(f64::sqrt),
            variance,
            median: quartiles.then(|| median(&sorted)),
            p25: quartiles.then(|| at(0.25)),
            p75: quartiles.then(|| at(0.75)),
            p90: quartiles.then(|| at(0.9)),
            p95: tails.then(|| at(0.95)),
            p99: tails.then(|| at(0.99)),
        })
    }
}

/// Mean and sample standard deviation, as used by the anomaly model.
#[must_use]
pub fn mean_and_stddev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let stddev = if values.len() > 1 {
        sample_variance(values, mean).sqrt()
    } else {
        0.1 * mean
    };
    Some((mean, stddev))
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    squares / (values.len() - 1) as f64
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
