//! Health score.
//!
//! Starts at 100; each signal subtracts a capped penalty. The score is
//! floored at 0 and mapped to a level.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthLevel {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 75.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Fair
        } else if score >= 25.0 {
            Self::Poor
        } else {
            Self::Critical
        }
    }
}

/// Signals the score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthSignals {
    pub critical_alerts: usize,
    pub error_alerts: usize,
    pub warning_alerts: usize,
    pub open_circuits: usize,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub high_error_rates: usize,
    pub recent_anomalies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub score: f64,
    pub level: HealthLevel,
    pub factors: Vec<String>,
}

impl HealthAssessment {
    #[must_use]
    pub fn assess(s: &HealthSignals) -> Self {
        let mut score = 100.0;
        let mut factors = Vec::new();
        let mut penalize = |count: usize, each: f64, cap: f64, label: &str| {
            if count > 0 {
                score -= (count as f64 * each).min(cap);
                factors.push(format!("{label}: {count}"));
            }
        };

        penalize(s.critical_alerts, 20.0, 50.0, "Critical alerts");
        penalize(s.error_alerts, 10.0, 30.0, "Error alerts");
        penalize(s.warning_alerts, 5.0, 20.0, "Warning alerts");
        penalize(s.open_circuits, 15.0, 40.0, "Open circuits");
        penalize(s.high_error_rates, 10.0, 40.0, "High error rates");
        penalize(s.recent_anomalies, 4.0, 20.0, "Recent anomalies");

        if s.cpu_percent > 80.0 {
            score -= ((s.cpu_percent - 80.0) * 1.5).min(30.0);
            factors.push(format!("High CPU: {:.1}%", s.cpu_percent));
        }
        if s.memory_percent > 85.0 {
            score -= ((s.memory_percent - 85.0) * 2.0).min(30.0);
            factors.push(format!("High memory: {:.1}%", s.memory_percent));
        }

        let score = f64::max(score, 0.0);
        Self {
            score,
            level: HealthLevel::from_score(score),
            factors,
        }
    }
}
