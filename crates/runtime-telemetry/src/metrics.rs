//! Prometheus metrics for the module runtime.
//!
//! All metrics follow the naming convention: `mr_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., bus_events_total)
//! - **Histogram**: Distribution of values (e.g., call_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry every runtime metric is registered in
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS
    // =========================================================================

    /// Events observed on the bus by the metrics bridge
    pub static ref BUS_EVENTS: CounterVec = CounterVec::new(
        Opts::new("mr_bus_events_total", "Bus events observed, by event name"),
        &["event"]
    ).expect("metric creation failed");

    // =========================================================================
    // CIRCUIT BREAKER
    // =========================================================================

    /// Circuit transitions by the state entered
    pub static ref CIRCUIT_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("mr_circuit_transitions_total", "Circuit state transitions"),
        &["state"]  // state: CLOSED/OPEN/HALF_OPEN
    ).expect("metric creation failed");

    // =========================================================================
    // INTERACTION MANAGER
    // =========================================================================

    /// Mediated calls by outcome
    pub static ref CALLS: CounterVec = CounterVec::new(
        Opts::new("mr_interaction_calls_total", "Mediated calls by outcome"),
        &["outcome"]  // outcome: success or the failure's trace code
    ).expect("metric creation failed");

    /// Mediated call duration
    pub static ref CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "mr_interaction_call_duration_seconds",
            "Time spent in mediated calls"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).expect("bucket layout is valid")),
        &["source", "target"]
    ).expect("metric creation failed");

    // =========================================================================
    // TELEMETRY COLLECTOR
    // =========================================================================

    /// Alerts raised by severity
    pub static ref ALERTS: CounterVec = CounterVec::new(
        Opts::new("mr_telemetry_alerts_total", "Alerts raised by severity"),
        &["severity"]
    ).expect("metric creation failed");

    /// Bridge deliveries whose payload could not be read
    pub static ref MALFORMED_EVENTS: IntCounter = IntCounter::new(
        "mr_bridge_malformed_events_total",
        "Bridged events with an unreadable payload"
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`].
///
/// Registering twice is harmless: duplicates are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BUS_EVENTS.clone()),
        Box::new(CIRCUIT_TRANSITIONS.clone()),
        Box::new(CALLS.clone()),
        Box::new(CALL_DURATION.clone()),
        Box::new(ALERTS.clone()),
        Box::new(MALFORMED_EVENTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
