//! Outgoing event payloads.

use serde::Serialize;

use crate::domain::CircuitState;

/// Payload of `circuit:state_change`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeEvent {
    pub circuit_id: String,
    pub old_state: CircuitState,
    pub new_state: CircuitState,
    pub timestamp: String,
    pub source: String,
    pub target: String,
}

/// Payload of `metrics:circuit_latency`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyEvent {
    pub circuit_id: String,
    pub duration_ms: f64,
    pub timestamp: f64,
}
