//! # Telemetry Pipeline
//!
//! The collector never calls into the other components; everything it knows
//! arrives over the bus. These scenarios run a full [`ModuleRuntime`] and
//! check what mediated calls, circuit transitions and system samples leave
//! behind in counters, alerts, health and reports.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{topics, EventPublisher};
    use shared_store::Store;
    use shared_types::{HandlerError, PermissionLevel, SecurityContext};

    use module_runtime::{ModuleRuntime, RuntimeConfig};
    use mr_03_telemetry_collector::{
        AlertSeverity, AlertType, HealthLevel, TelemetryCollector, REALTIME_WINDOW,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn started_runtime() -> ModuleRuntime {
        let mut config = RuntimeConfig::default();
        config.store.sweep_interval = None;
        let runtime = ModuleRuntime::new(config).unwrap();
        assert!(runtime.start());
        runtime
    }

    fn collector_of(runtime: &ModuleRuntime) -> &Arc<TelemetryCollector> {
        runtime.collector().unwrap()
    }

    fn normal() -> SecurityContext {
        SecurityContext::new(PermissionLevel::Normal)
    }

    fn alert_log(runtime: &ModuleRuntime) -> Arc<Mutex<Vec<Value>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        runtime.bus().on(topics::SYSTEM_ALERT, move |_, payload| {
            seen.lock().push(payload.clone());
            Ok::<_, HandlerError>(())
        });
        log
    }

    // =============================================================================
    // CALLS FEED COUNTERS
    // =============================================================================

    #[tokio::test]
    async fn test_successful_calls_reach_collector() {
        let runtime = started_runtime();
        let manager = runtime.manager();
        manager.register_edge("ui", "db", PermissionLevel::Read, None);
        manager.expose("db", |payload| async move { Ok::<_, HandlerError>(payload) });

        for i in 0..3 {
            manager
                .call("ui", "db", json!({ "n": i }), Some(&normal()))
                .await
                .unwrap();
        }

        let collector = collector_of(&runtime);
        assert_eq!(collector.counter("success.ui.db"), 3);
        assert_eq!(collector.counter("interaction.ui.db"), 3);
        assert_eq!(collector.counter("interaction.total"), 3);
        assert!(collector.metrics(Some("latency.*")).contains_key("latency.ui.db"));
        assert!(collector.active_alerts().is_empty());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_tripped_edge_raises_circuit_alert_and_degrades_health() {
        let runtime = started_runtime();
        let alerts = alert_log(&runtime);
        let manager = runtime.manager();
        manager.register_edge("ui", "db", PermissionLevel::Read, None);
        manager.expose("db", |_| async move {
            Err::<Value, _>(HandlerError::new("db offline"))
        });

        // Fallback is enabled by default: callers see null, not errors.
        for _ in 0..4 {
            let reply = manager
                .call("ui", "db", json!(null), Some(&normal()))
                .await
                .unwrap();
            assert_eq!(reply, Value::Null);
        }

        let collector = collector_of(&runtime);
        assert_eq!(collector.counter("error.ui.db"), 4);
        assert_eq!(collector.counter("error.ui.db.EXECUTION_ERROR"), 3);
        assert_eq!(collector.counter("error.ui.db.CIRCUIT_OPEN"), 1);

        let active = collector.active_alerts();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_type, AlertType::CircuitOpen);
        assert_eq!(active[0].severity, AlertSeverity::Error);
        assert_eq!(active[0].metric, "ui:db");

        // Published once even though the circuit stayed open.
        let published = alerts.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["type"], "CIRCUIT_OPEN");

        // One error alert, one open circuit and one edge above 10% errors.
        let health = collector.assess_health();
        assert_eq!(health.score, 65.0);
        assert_eq!(health.level, HealthLevel::Fair);

        drop(published);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_reset_circuit_clears_alert() {
        let runtime = started_runtime();
        let manager = runtime.manager();
        manager.register_edge("ui", "db", PermissionLevel::Read, None);
        manager.expose("db", |_| async move {
            Err::<Value, _>(HandlerError::new("db offline"))
        });
        for _ in 0..3 {
            manager.call("ui", "db", json!(null), Some(&normal())).await.unwrap();
        }
        assert_eq!(collector_of(&runtime).active_alerts().len(), 1);

        assert!(runtime.breaker().reset("ui:db"));
        assert!(collector_of(&runtime).active_alerts().is_empty());

        runtime.shutdown().await;
    }

    // =============================================================================
    // SYSTEM SAMPLES
    // =============================================================================

    #[tokio::test]
    async fn test_cpu_sample_crosses_critical_threshold() {
        let runtime = started_runtime();
        let alerts = alert_log(&runtime);
        let collector = collector_of(&runtime);

        runtime
            .bus()
            .emit(topics::SYSTEM_CPU_USAGE, json!({ "percent": 95.0 }));
        assert_eq!(collector.metrics(Some("cpu.*"))["cpu.percent"], 95.0);

        collector.aggregate_window(REALTIME_WINDOW);
        collector.aggregate_window(REALTIME_WINDOW);

        let published = alerts.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["type"], "HIGH_CPU");
        assert_eq!(published[0]["severity"], "CRITICAL");
        assert_eq!(runtime.store().keys(Some("alerts.*")).len(), 1);

        drop(published);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_generic_metrics_feed_anomaly_detection() {
        let runtime = started_runtime();
        let collector = collector_of(&runtime);

        let detected = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&detected);
        runtime.bus().on(topics::ANOMALY_DETECTED, move |_, payload| {
            seen.lock().push(payload.clone());
            Ok::<_, HandlerError>(())
        });

        for _ in 0..29 {
            runtime
                .bus()
                .emit("metrics:queue", json!({ "depth": 10.0, "timestamp": 1.0 }));
        }
        runtime
            .bus()
            .emit("metrics:queue", json!({ "depth": 1000.0, "timestamp": 1.0 }));
        assert!(!collector.metrics(None).contains_key("queue.timestamp"));

        assert_eq!(collector.run_anomaly_pass(), 1);
        assert_eq!(detected.lock().len(), 1);

        let anomalies = collector.anomalies(10);
        assert_eq!(anomalies[0].metric, "queue.depth");
        assert_eq!(anomalies[0].value, 1000.0);
        assert_eq!(runtime.store().keys(Some("anomaly.queue.depth.*")).len(), 1);

        runtime.shutdown().await;
    }

    // =============================================================================
    // REPORTS
    // =============================================================================

    #[tokio::test]
    async fn test_report_is_persisted_with_counters() {
        let runtime = started_runtime();
        let manager = runtime.manager();
        manager.register_edge("ui", "db", PermissionLevel::Read, None);
        manager.expose("db", |payload| async move { Ok::<_, HandlerError>(payload) });
        manager.call("ui", "db", json!(1), Some(&normal())).await.unwrap();

        let report = collector_of(&runtime).generate_report();
        assert_eq!(report.counters["success.total"], 1);
        assert!(report.active_alerts.is_empty());
        assert_eq!(report.system_health.level, HealthLevel::Excellent);

        let keys = runtime.store().keys(Some("reports.system.*"));
        assert_eq!(keys.len(), 1);
        let stored = runtime.store().get(&keys[0]).unwrap();
        assert_eq!(stored["counters"]["success.ui.db"], 1);
        assert!(stored.get("systemHealth").is_some());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_feeding_collector() {
        let runtime = started_runtime();
        let collector = Arc::clone(collector_of(&runtime));
        runtime.shutdown().await;

        assert!(!collector.is_running());
        runtime
            .bus()
            .emit(topics::SYSTEM_CPU_USAGE, json!({ "percent": 42.0 }));
        assert!(collector.metrics(Some("cpu.*")).is_empty());
    }
}
