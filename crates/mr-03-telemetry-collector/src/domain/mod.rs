//! Collector domain: buffers, statistics, anomaly models, alerts, health.

pub mod alert;
pub mod anomaly;
pub mod buffer;
pub mod health;
pub mod report;
pub mod statistics;

pub use alert::{Admission, Alert, AlertBook, AlertSeverity, AlertType};
pub use anomaly::{Anomaly, AnomalyModel, ModelStats};
pub use buffer::MetricBuffer;
pub use health::{HealthAssessment, HealthLevel, HealthSignals};
pub use report::{TelemetryReport, WindowStatistics};
pub use statistics::{mean_and_stddev, Statistics};
