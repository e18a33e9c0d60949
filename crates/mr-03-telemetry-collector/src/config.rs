//! Collector configuration.
//!
//! Defaults:
//!
//! | Setting | Value |
//! |---------|-------|
//! | windows | realtime 10s, minute 60s, hour 3600s, day 86400s |
//! | anomaly model | >= 30 samples, last 10 checked, z > 3, refit every 600s |
//! | anomaly loop | first pass after 30s, then every 10s |
//! | buffers | 1000 samples per metric, 100 anomalies |
//! | alerts | same key suppressed for 300s, dropped after 24h |

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the window whose aggregation keeps the buffer.
pub const REALTIME_WINDOW: &str = "realtime";

/// A time bucket over which buffered samples are reduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationWindow {
    pub name: String,
    pub interval: Duration,
}

impl AggregationWindow {
    #[must_use]
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
        }
    }

    /// Every window except realtime clears the buffers it aggregated.
    #[must_use]
    pub fn clears_buffer(&self) -> bool {
        self.name != REALTIME_WINDOW
    }
}

/// Warning and critical levels for a metric pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: Option<f64>,
    pub critical: Option<f64>,
}

impl Threshold {
    #[must_use]
    pub fn new(warning: f64, critical: f64) -> Self {
        Self {
            warning: Some(warning),
            critical: Some(critical),
        }
    }

    /// Overwrite the levels set in `other`.
    pub fn merge(&mut self, other: Threshold) {
        if other.warning.is_some() {
            self.warning = other.warning;
        }
        if other.critical.is_some() {
            self.critical = other.critical;
        }
    }
}

/// Anomaly model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyConfig {
    /// Buffered samples required before a model is built
    pub min_samples: usize,
    /// Most recent samples scored on each pass
    pub recent_window: usize,
    /// |z| above this is an anomaly
    pub z_limit: f64,
    /// Age after which a model is blended with fresh data
    pub refresh_after: Duration,
    /// Delay before the first pass
    pub initial_delay: Duration,
    /// Period between passes
    pub interval: Duration,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_samples: 30,
            recent_window: 10,
            z_limit: 3.0,
            refresh_after: Duration::from_secs(600),
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(10),
        }
    }
}

/// Telemetry collector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub windows: Vec<AggregationWindow>,
    /// Keyed by metric pattern (`exact`, `prefix*`, `*suffix`, `a*b`)
    pub thresholds: BTreeMap<String, Threshold>,
    pub anomaly: AnomalyConfig,
    /// Aggregation loop tick
    pub tick: Duration,
    pub maintenance_interval: Duration,
    pub max_buffer: usize,
    pub max_anomalies: usize,
    /// Same-key alerts inside this window are suppressed
    pub alert_dedup: Duration,
    /// A suppressed alert still fires once its value grows by this factor
    pub alert_escalation: f64,
    /// Active alerts older than this are dropped by maintenance
    pub alert_ttl: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let thresholds = [
            ("cpu.percent", Threshold::new(70.0, 90.0)),
            ("memory.percent", Threshold::new(80.0, 95.0)),
            ("latency.interaction", Threshold::new(1000.0, 5000.0)),
            ("error.rate", Threshold::new(0.05, 0.2)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            windows: vec![
                AggregationWindow::new(REALTIME_WINDOW, Duration::from_secs(10)),
                AggregationWindow::new("minute", Duration::from_secs(60)),
                AggregationWindow::new("hour", Duration::from_secs(3600)),
                AggregationWindow::new("day", Duration::from_secs(86_400)),
            ],
            thresholds,
            anomaly: AnomalyConfig::default(),
            tick: Duration::from_secs(1),
            maintenance_interval: Duration::from_secs(86_400),
            max_buffer: 1000,
            max_anomalies: 100,
            alert_dedup: Duration::from_secs(300),
            alert_escalation: 1.5,
            alert_ttl: Duration::from_secs(86_400),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn window(&self, name: &str) -> Option<&AggregationWindow> {
        self.windows.iter().find(|w| w.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = CollectorConfig::default();
        assert_eq!(config.thresholds["cpu.percent"], Threshold::new(70.0, 90.0));
        assert_eq!(config.thresholds.len(), 4);
        assert!(!config.window(REALTIME_WINDOW).unwrap().clears_buffer());
        assert!(config.window("hour").unwrap().clears_buffer());
    }

    #[test]
    fn test_threshold_merge_keeps_unset_levels() {
        let mut threshold = Threshold::new(1.0, 2.0);
        threshold.merge(Threshold {
            warning: None,
            critical: Some(5.0),
        });
        assert_eq!(threshold, Threshold::new(1.0, 5.0));
    }
}
