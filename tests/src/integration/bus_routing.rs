//! # Bus Routing
//!
//! Delivery rules of the in-process bus as the components rely on them:
//! wildcard fan-out, registration order, isolation of failing handlers and
//! the `emit_and_wait` join point used by mediated calls.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{EventPublisher, InMemoryEventBus};
    use shared_types::HandlerError;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Subscribe a handler that appends `<tag>:<event>` to `log`.
    fn record(bus: &InMemoryEventBus, pattern: &str, tag: &'static str, log: &Arc<Mutex<Vec<String>>>) {
        let log = Arc::clone(log);
        bus.on(pattern, move |name, _| {
            log.lock().push(format!("{tag}:{name}"));
            Ok::<_, HandlerError>(())
        });
    }

    // =============================================================================
    // WILDCARD DELIVERY
    // =============================================================================

    #[tokio::test]
    async fn test_wildcard_receives_every_matching_event() {
        let bus = InMemoryEventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&bus, "sys:*", "any", &log);

        assert_eq!(bus.emit("sys:started", json!({})), 1);
        assert_eq!(bus.emit("sys:stopped", json!({})), 1);
        assert_eq!(bus.emit("syslog", json!({})), 0);
        assert_eq!(bus.emit("app:started", json!({})), 0);

        assert_eq!(
            *log.lock(),
            vec!["any:sys:started".to_string(), "any:sys:stopped".to_string()]
        );
    }

    #[tokio::test]
    async fn test_exact_and_wildcard_run_in_registration_order() {
        let bus = InMemoryEventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&bus, "sys:*", "first", &log);
        record(&bus, "sys:started", "second", &log);
        record(&bus, "*", "third", &log);

        assert_eq!(bus.emit("sys:started", json!({})), 3);
        assert_eq!(
            *log.lock(),
            vec![
                "first:sys:started".to_string(),
                "second:sys:started".to_string(),
                "third:sys:started".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_delivery() {
        let bus = InMemoryEventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("sys:*", |_, _| Err(HandlerError::new("boom")));
        bus.on("sys:*", |_, _| panic!("handler panic"));
        record(&bus, "sys:*", "survivor", &log);

        // Failed handlers are not counted as notified.
        assert_eq!(bus.emit("sys:tick", json!({})), 1);
        assert_eq!(*log.lock(), vec!["survivor:sys:tick".to_string()]);
    }

    // =============================================================================
    // SUBSCRIPTION LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_subscription_ids_are_unique_and_removable() {
        let bus = InMemoryEventBus::new();
        let a = bus.on("sys:*", |_, _| Ok(()));
        let b = bus.on("sys:*", |_, _| Ok(()));
        assert_ne!(a, b);
        assert_eq!(bus.subscriber_count(Some("sys:*")), 2);

        assert!(bus.unsubscribe(&a));
        assert!(!bus.unsubscribe(&a));
        assert_eq!(bus.emit("sys:started", json!({})), 1);

        assert!(bus.unsubscribe(&b));
        assert_eq!(bus.subscriber_count(None), 0);
        assert_eq!(bus.emit("sys:started", json!({})), 0);
    }

    #[tokio::test]
    async fn test_emit_and_wait_joins_async_handlers() {
        let bus = InMemoryEventBus::new();
        bus.on("module:handle:calc", |_, _| Ok(()));
        bus.on_async("module:handle:*", |_, payload: Value| async move {
            let n = payload.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok::<_, HandlerError>(json!(n * 2))
        });

        let results = bus.emit_and_wait("module:handle:calc", json!({ "n": 21 })).await;
        assert_eq!(results, vec![None, Some(json!(42))]);
        assert_eq!(bus.stats().events_emitted, 1);

        bus.shutdown().await;
    }
}
