//! Alerts and their de-duplication.
//!
//! Active alerts are keyed `<TYPE>:<metric>`. A new alert for an active key
//! inside the dedup window is suppressed unless its severity is higher or
//! its value grew by the escalation factor. Growth only counts from a
//! positive previous value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighCpu,
    HighMemory,
    HighLatency,
    ErrorRate,
    CircuitOpen,
    ComponentError,
    SystemDegraded,
    AnomalyDetected,
    TimeoutSpike,
    ResourceExhaustion,
    SecurityViolation,
}

impl AlertType {
    /// Classify a metric by its name prefix.
    #[must_use]
    pub fn for_metric(metric: &str) -> Self {
        if metric.starts_with("cpu") {
            Self::HighCpu
        } else if metric.starts_with("memory") {
            Self::HighMemory
        } else if metric.starts_with("latency") {
            Self::HighLatency
        } else if metric.starts_with("error") {
            Self::ErrorRate
        } else {
            Self::AnomalyDetected
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::HighCpu => "HIGH_CPU",
            Self::HighMemory => "HIGH_MEMORY",
            Self::HighLatency => "HIGH_LATENCY",
            Self::ErrorRate => "ERROR_RATE",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::ComponentError => "COMPONENT_ERROR",
            Self::SystemDegraded => "SYSTEM_DEGRADED",
            Self::AnomalyDetected => "ANOMALY_DETECTED",
            Self::TimeoutSpike => "TIMEOUT_SPIKE",
            Self::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            Self::SecurityViolation => "SECURITY_VIOLATION",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Payload of `system:alert`; also persisted under `alerts.<stamp>-<key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub metric: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub message: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl Alert {
    /// Alert for a metric value crossing `threshold`.
    #[must_use]
    pub fn for_metric(metric: &str, value: f64, threshold: f64, severity: AlertSeverity, now: f64) -> Self {
        let alert_type = AlertType::for_metric(metric);
        Self {
            alert_type,
            severity,
            metric: metric.to_string(),
            value: Some(value),
            threshold: Some(threshold),
            message: metric_message(alert_type, metric, value, threshold, severity),
            timestamp: now,
            details: Value::Null,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Dedup key: `<TYPE>:<metric>`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.alert_type, self.metric)
    }
}

fn metric_message(
    alert_type: AlertType,
    metric: &str,
    value: f64,
    threshold: f64,
    severity: AlertSeverity,
) -> String {
    let (value, threshold) = if metric.starts_with("latency") {
        (format!("{value:.2}ms"), format!("{threshold:.2}ms"))
    } else if metric.ends_with("percent") {
        (format!("{value:.1}%"), format!("{threshold:.1}%"))
    } else if metric.starts_with("error.rate") {
        (format!("{:.2}%", value * 100.0), format!("{:.2}%", threshold * 100.0))
    } else {
        (format!("{value:.2}"), format!("{threshold:.2}"))
    };

    let what = match alert_type {
        AlertType::HighCpu => "High CPU usage".to_string(),
        AlertType::HighMemory => "High memory usage".to_string(),
        AlertType::HighLatency => format!("High latency on {metric}"),
        AlertType::ErrorRate => format!("High error rate on {metric}"),
        AlertType::AnomalyDetected => format!("Anomaly detected on {metric}"),
        _ => format!("Alert on {metric}"),
    };
    format!("{severity}: {what} - {value} (threshold: {threshold})")
}

/// Outcome of offering an alert to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Raised,
    Suppressed,
}

/// Active alerts, keyed by dedup key.
#[derive(Debug, Default)]
pub struct AlertBook {
    active: BTreeMap<String, Alert>,
}

impl AlertBook {
    /// Record `alert` under its own key unless a recent alert suppresses it.
    pub fn offer(&mut self, alert: &Alert, dedup_secs: f64, escalation: f64) -> Admission {
        self.offer_keyed(alert.key(), alert, dedup_secs, escalation)
    }

    pub fn offer_keyed(&mut self, key: String, alert: &Alert, dedup_secs: f64, escalation: f64) -> Admission {
        if let Some(last) = self.active.get(&key) {
            let recent = alert.timestamp - last.timestamp < dedup_secs;
            let escalated = alert.severity > last.severity;
            let grew = match (alert.value, last.value) {
                (Some(now), Some(before)) => before > 0.0 && now >= before * escalation,
                _ => false,
            };
            if recent && !escalated && !grew {
                return Admission::Suppressed;
            }
        }
        self.active.insert(key, alert.clone());
        Admission::Raised
    }

    pub fn remove(&mut self, key: &str) -> Option<Alert> {
        self.active.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// Drop alerts raised more than `ttl_secs` before `now`.
    pub fn expire(&mut self, now: f64, ttl_secs: f64) -> usize {
        let before = self.active.len();
        self.active.retain(|_, a| now - a.timestamp <= ttl_secs);
        before - self.active.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.active.keys()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.active.values()
    }

    #[must_use]
    pub fn count(&self, severity: AlertSeverity) -> usize {
        self.active.values().filter(|a| a.severity == severity).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
