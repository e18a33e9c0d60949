//! Bus subscriptions.
//!
//! | Event | Recorded as |
//! |-------|-------------|
//! | `system:state_changed` | `system.state.<stamp>`; DEGRADED/ERROR raises SYSTEM_DEGRADED |
//! | `system:metrics` | `cpu.percent`, `memory.used_mb`, `memory.percent`, `system.uptime` |
//! | `system:cpu_usage` | `cpu.percent` |
//! | `system:memory_usage` | `memory.used_mb`, `memory.percent` |
//! | `module:interaction_error` | `error.*` counters, `error.rate.<s>.<t>` |
//! | `circuit:state_change` | CIRCUIT_OPEN alert while open |
//! | `telemetry:interaction` | `success.*`, `error.*`, `interaction.*` counters |
//! | `telemetry:latency` | `latency.<s>.<t>`, `latency.interaction` |
//! | `metrics:*` | `<suffix>.<field>` for every numeric field but `timestamp` |
//!
//! Payload fields are read in camelCase with a snake_case fallback.

use std::sync::{Arc, Weak};

use serde_json::{json, Value};
use shared_bus::{topics, SubscriptionId};
use shared_types::{key_stamp, unix_now, HandlerError};
use tracing::{debug, info};

use crate::domain::{Alert, AlertSeverity, AlertType};
use crate::service::CollectorCore;

/// Prefix of the alert key held while a circuit is open.
pub(crate) const CIRCUIT_OPEN_KEY: &str = "circuit_open:";

/// Error rate above which a pair raises an alert.
const ERROR_RATE_ALERT: f64 = 0.5;
/// Calls a pair needs before its error rate can alert.
const ERROR_RATE_MIN_CALLS: u64 = 10;
/// Single-call latency that raises an alert, in ms.
const LATENCY_ALERT_MS: f64 = 5000.0;

type Handle = fn(&CollectorCore, &str, &Value, f64);

/// Register every collector handler on the core's bus.
///
/// Handlers hold a weak reference so the bus never keeps a stopped
/// collector alive.
pub(crate) fn subscribe(core: &Arc<CollectorCore>) -> Vec<SubscriptionId> {
    let routes: [(&str, Handle); 9] = [
        (topics::SYSTEM_STATE_CHANGED, on_state_changed),
        (topics::SYSTEM_METRICS, on_system_metrics),
        (topics::SYSTEM_CPU_USAGE, on_cpu_usage),
        (topics::SYSTEM_MEMORY_USAGE, on_memory_usage),
        (topics::INTERACTION_ERROR, on_interaction_error),
        (topics::CIRCUIT_STATE_CHANGE, on_circuit_state),
        (topics::TELEMETRY_INTERACTION, on_interaction),
        (topics::TELEMETRY_LATENCY, on_latency),
        (topics::METRICS_ANY, on_generic_metrics),
    ];

    routes
        .into_iter()
        .map(|(pattern, handle)| {
            let weak: Weak<CollectorCore> = Arc::downgrade(core);
            core.bus().on(pattern, move |name, payload| {
                if let Some(core) = weak.upgrade() {
                    handle(&core, name, payload, unix_now());
                }
                Ok::<_, HandlerError>(())
            })
        })
        .collect()
}

fn number(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| payload.get(*k)?.as_f64())
}

fn text<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| payload.get(*k)?.as_str())
}

fn pair(payload: &Value) -> (&str, &str) {
    (
        text(payload, &["source"]).unwrap_or("unknown"),
        text(payload, &["target"]).unwrap_or("unknown"),
    )
}

fn on_state_changed(core: &CollectorCore, _: &str, payload: &Value, now: f64) {
    core.persist(&format!("system.state.{}", key_stamp(now)), payload.clone());

    let Some(state) = text(payload, &["newState", "new_state"]) else {
        return;
    };
    let state = state.to_ascii_uppercase();
    if state != "DEGRADED" && state != "ERROR" {
        return;
    }

    let components = payload
        .get("errorComponents")
        .or_else(|| payload.get("error_components"))
        .cloned()
        .unwrap_or(Value::Null);
    core.raise(Alert {
        alert_type: AlertType::SystemDegraded,
        severity: AlertSeverity::Error,
        metric: "system.state".to_string(),
        value: None,
        threshold: None,
        message: format!("ERROR: System entered {state} state"),
        timestamp: now,
        details: json!({ "newState": state, "errorComponents": components }),
    });
}

fn on_system_metrics(core: &CollectorCore, _: &str, payload: &Value, now: f64) {
    let fields = [
        (["cpuPercent", "cpu_percent"], "cpu.percent"),
        (["memoryUsedMb", "memory_used_mb"], "memory.used_mb"),
        (["memoryPercent", "memory_percent"], "memory.percent"),
        (["uptimeSeconds", "uptime_seconds"], "system.uptime"),
    ];
    for (keys, metric) in fields {
        if let Some(v) = number(payload, &keys) {
            core.record_metric(metric, v);
        }
    }
    core.persist(&format!("system.metrics.{}", key_stamp(now)), payload.clone());
}

fn on_cpu_usage(core: &CollectorCore, _: &str, payload: &Value, _: f64) {
    if let Some(v) = number(payload, &["percent", "cpuPercent", "cpu_percent"]) {
        core.record_metric("cpu.percent", v);
    }
}

fn on_memory_usage(core: &CollectorCore, _: &str, payload: &Value, _: f64) {
    let used = number(payload, &["usedMb", "used_mb", "used"]);
    if let Some(used) = used {
        core.record_metric("memory.used_mb", used);
    }
    let total = number(payload, &["totalMb", "total_mb", "total"]);
    match (used, total) {
        (Some(used), Some(total)) if total > 0.0 => {
            core.record_metric("memory.percent", used / total * 100.0);
        }
        _ => {
            if let Some(p) = number(payload, &["percent"]) {
                core.record_metric("memory.percent", p);
            }
        }
    }
}

fn on_interaction_error(core: &CollectorCore, _: &str, payload: &Value, now: f64) {
    let (source, target) = pair(payload);
    let kind = text(payload, &["errorType", "error_type"]).unwrap_or("UNKNOWN");

    core.increment_counter(&format!("error.{source}.{target}.{kind}"), 1);
    core.increment_counter("error.total", 1);
    let errors = core.increment_counter(&format!("error.{source}.{target}"), 1);
    let successes = core.counter(&format!("success.{source}.{target}"));

    let total = errors + successes;
    let rate = errors as f64 / total as f64;
    let metric = format!("error.rate.{source}.{target}");
    core.record_metric(&metric, rate);

    if rate > ERROR_RATE_ALERT && total > ERROR_RATE_MIN_CALLS {
        let alert = Alert::for_metric(&metric, rate, ERROR_RATE_ALERT, AlertSeverity::Error, now)
            .with_details(json!({ "errors": errors, "total": total, "lastErrorType": kind }));
        core.raise(alert);
    }
}

fn on_circuit_state(core: &CollectorCore, _: &str, payload: &Value, now: f64) {
    let Some(id) = text(payload, &["circuitId", "circuit_id"]) else {
        debug!("Circuit state change without an id");
        return;
    };
    let key = format!("{CIRCUIT_OPEN_KEY}{id}");

    match text(payload, &["newState", "new_state"]) {
        Some("OPEN") => {
            let failures = payload.get("failureCount").cloned().unwrap_or(Value::Null);
            core.raise_once(
                key,
                Alert {
                    alert_type: AlertType::CircuitOpen,
                    severity: AlertSeverity::Error,
                    metric: id.to_string(),
                    value: None,
                    threshold: None,
                    message: format!("ERROR: Circuit {id} opened"),
                    timestamp: now,
                    details: json!({ "circuitId": id, "failureCount": failures }),
                },
            );
        }
        Some("CLOSED") => {
            if core.clear_alert(&key) {
                info!(circuit = id, "Circuit recovered; alert cleared");
            }
        }
        _ => {}
    }
}

fn on_interaction(core: &CollectorCore, _: &str, payload: &Value, _: f64) {
    let (source, target) = pair(payload);
    let outcome = if payload.get("success").and_then(Value::as_bool).unwrap_or(true) {
        "success"
    } else {
        "error"
    };

    core.increment_counter(&format!("{outcome}.{source}.{target}"), 1);
    core.increment_counter(&format!("{outcome}.total"), 1);
    core.increment_counter(&format!("interaction.{source}.{target}"), 1);
    core.increment_counter("interaction.total", 1);
}

fn on_latency(core: &CollectorCore, _: &str, payload: &Value, now: f64) {
    let Some(duration) = number(payload, &["durationMs", "duration_ms", "duration"]) else {
        return;
    };
    let (source, target) = pair(payload);
    let metric = format!("latency.{source}.{target}");
    if !core.record_metric(&metric, duration) {
        return;
    }
    core.record_metric("latency.interaction", duration);

    if duration > LATENCY_ALERT_MS {
        core.raise(Alert::for_metric(
            &metric,
            duration,
            LATENCY_ALERT_MS,
            AlertSeverity::Error,
            now,
        ));
    }
}

fn on_generic_metrics(core: &CollectorCore, name: &str, payload: &Value, _: f64) {
    let Some(fields) = payload.as_object() else {
        return;
    };
    let suffix = name.rsplit(':').next().unwrap_or(name);
    for (field, value) in fields.iter().filter(|(f, _)| f.as_str() != "timestamp") {
        if let Some(v) = value.as_f64() {
            core.record_metric(&format!("{suffix}.{field}"), v);
        }
    }
}
