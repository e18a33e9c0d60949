//! # Metrics Bridge
//!
//! Translates bus events into Prometheus series so the components stay
//! free of any metrics dependency.
//!
//! | Event | Series |
//! |-------|--------|
//! | `circuit:state_change` | `mr_circuit_transitions_total{state}` |
//! | `telemetry:interaction` | `mr_interaction_calls_total{outcome="success"}` |
//! | `module:interaction_error` | `mr_interaction_calls_total{outcome=<errorType>}` |
//! | `telemetry:latency` | `mr_interaction_call_duration_seconds{source,target}` |
//! | `system:alert` | `mr_telemetry_alerts_total{severity}` |
//!
//! Every bridged event also counts in `mr_bus_events_total{event}`.

use runtime_telemetry::{
    ALERTS, BUS_EVENTS, CALLS, CALL_DURATION, CIRCUIT_TRANSITIONS, MALFORMED_EVENTS,
};
use serde_json::Value;
use shared_bus::{topics, InMemoryEventBus, SubscriptionId};
use shared_types::HandlerError;
use tracing::debug;

fn field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn observe(event: &str, payload: &Value) -> bool {
    match event {
        topics::CIRCUIT_STATE_CHANGE => field(payload, "newState")
            .map(|state| CIRCUIT_TRANSITIONS.with_label_values(&[state]).inc())
            .is_some(),
        topics::TELEMETRY_INTERACTION => {
            let success = payload.get("success").and_then(Value::as_bool).unwrap_or(true);
            if success {
                CALLS.with_label_values(&["success"]).inc();
            }
            true
        }
        topics::INTERACTION_ERROR => field(payload, "errorType")
            .map(|kind| CALLS.with_label_values(&[kind]).inc())
            .is_some(),
        topics::TELEMETRY_LATENCY => {
            let Some(ms) = payload.get("durationMs").and_then(Value::as_f64) else {
                return false;
            };
            let source = field(payload, "source").unwrap_or("unknown");
            let target = field(payload, "target").unwrap_or("unknown");
            CALL_DURATION
                .with_label_values(&[source, target])
                .observe(ms / 1000.0);
            true
        }
        topics::SYSTEM_ALERT => field(payload, "severity")
            .map(|severity| ALERTS.with_label_values(&[severity]).inc())
            .is_some(),
        _ => false,
    }
}

/// Live subscriptions of the bridge on one bus.
pub struct MetricsBridge {
    subscriptions: Vec<SubscriptionId>,
}

impl MetricsBridge {
    /// Bridged event names.
    pub const EVENTS: [&'static str; 5] = [
        topics::CIRCUIT_STATE_CHANGE,
        topics::TELEMETRY_INTERACTION,
        topics::INTERACTION_ERROR,
        topics::TELEMETRY_LATENCY,
        topics::SYSTEM_ALERT,
    ];

    /// Subscribe to every bridged event on `bus`.
    #[must_use]
    pub fn attach(bus: &InMemoryEventBus) -> Self {
        let subscriptions = Self::EVENTS
            .iter()
            .map(|event| {
                bus.on(event, |name, payload| {
                    BUS_EVENTS.with_label_values(&[name]).inc();
                    if !observe(name, payload) {
                        MALFORMED_EVENTS.inc();
                        debug!(event = name, "Bridged event without the expected fields");
                    }
                    Ok::<_, HandlerError>(())
                })
            })
            .collect();
        Self { subscriptions }
    }

    /// Remove the bridge's subscriptions from `bus`.
    pub fn detach(self, bus: &InMemoryEventBus) {
        for id in &self.subscriptions {
            bus.unsubscribe(id);
        }
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::EventPublisher;

    #[test]
    fn test_bridge_records_events() {
        let bus = InMemoryEventBus::new();
        let bridge = MetricsBridge::attach(&bus);
        assert_eq!(bridge.subscription_count(), 5);

        let latency = CALL_DURATION.with_label_values(&["bridge-src", "bridge-dst"]);
        let before = latency.get_sample_count();
        bus.emit(
            topics::TELEMETRY_LATENCY,
            json!({ "source": "bridge-src", "target": "bridge-dst", "durationMs": 20.0 }),
        );
        assert_eq!(latency.get_sample_count(), before + 1);

        let info = ALERTS.with_label_values(&["INFO"]);
        let before = info.get();
        bus.emit(topics::SYSTEM_ALERT, json!({ "severity": "INFO" }));
        assert!(info.get() >= before + 1.0);

        bridge.detach(&bus);
        assert_eq!(bus.subscriber_count(None), 0);
    }

    #[test]
    fn test_malformed_payload_is_counted() {
        let before = MALFORMED_EVENTS.get();
        assert!(!observe(topics::CIRCUIT_STATE_CHANGE, &json!({})));
        assert!(observe(topics::CIRCUIT_STATE_CHANGE, &json!({ "newState": "OPEN" })));

        let bus = InMemoryEventBus::new();
        let _bridge = MetricsBridge::attach(&bus);
        bus.emit(topics::INTERACTION_ERROR, json!({}));
        assert!(MALFORMED_EVENTS.get() >= before + 1);
    }
}
