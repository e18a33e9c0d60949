//! Persisted aggregates and the system report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::alert::Alert;
use super::anomaly::Anomaly;
use super::health::HealthAssessment;
use super::statistics::Statistics;

/// One window's aggregate of one metric, stored under
/// `metrics.<window>.<metric>.<stamp>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub timestamp: String,
    pub interval: String,
    pub metric: String,
    pub stats: Statistics,
}

/// Snapshot of everything the collector knows, stored under
/// `reports.system.<stamp>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    pub timestamp: String,
    pub metrics: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, u64>,
    /// Realtime statistics of metrics with more than five buffered samples
    pub stats: BTreeMap<String, Statistics>,
    pub active_alerts: Vec<Alert>,
    pub recent_anomalies: Vec<Anomaly>,
    pub system_health: HealthAssessment,
}
