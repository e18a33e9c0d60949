//! # Shared Store
//!
//! Key-value persistence used by the circuit breaker (circuit records), the
//! interaction manager (call traces) and the telemetry collector (windowed
//! statistics, alerts, anomalies, reports).
//!
//! The store is the one structure touched from two execution contexts: the
//! async event loop and the TTL sweeper thread. All access goes through a
//! single mutex owned by [`InMemoryStore`].

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod memory;
pub mod port;

pub use memory::{InMemoryStore, StoreConfig, DEFAULT_SWEEP_INTERVAL};
pub use port::{Store, StoreStats};
