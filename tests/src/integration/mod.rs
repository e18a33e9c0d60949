//! Cross-component scenarios.

pub mod bus_routing;
pub mod circuit_recovery;
pub mod mediation;
pub mod telemetry_pipeline;
