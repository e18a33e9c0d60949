//! # Telemetry Collector
//!
//! Listens to system and interaction events on the bus, buffers samples per
//! metric, and turns them into aggregates, alerts and a health score.
//!
//! ```text
//!  bus events ──► handlers ──► buffers / counters
//!                                   │
//!        ┌──────────────────────────┼──────────────────────┐
//!        ▼                          ▼                      ▼
//!   aggregation loop          anomaly loop          maintenance loop
//!   (windows, thresholds)     (z-score models)      (caps, alert expiry)
//!        │                          │
//!        └──────────► alerts ◄──────┘ ──► system:alert, store
//! ```
//!
//! ## Store Keys
//!
//! | Key | Written by |
//! |-----|------------|
//! | `metrics.<window>.<metric>.<stamp>` | aggregation |
//! | `alerts.<stamp>-<TYPE>:<metric>` | every raised alert |
//! | `anomaly.<metric>.<stamp>-<seq>` | anomaly detection |
//! | `reports.system.<stamp>` | [`TelemetryCollector::generate_report`] |
//! | `system.state.<stamp>`, `system.metrics.<stamp>` | system event handlers |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
mod handlers;
pub mod service;
mod tasks;

pub use config::{AggregationWindow, AnomalyConfig, CollectorConfig, Threshold, REALTIME_WINDOW};
pub use domain::{
    Alert, AlertSeverity, AlertType, Anomaly, HealthAssessment, HealthLevel, Statistics,
    TelemetryReport, WindowStatistics,
};
pub use service::TelemetryCollector;
