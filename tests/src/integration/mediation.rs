//! # Mediated Calls
//!
//! A caller names a target; the manager checks the permission edge, runs the
//! call through the edge's circuit under its deadline and answers over the
//! bus. These scenarios cover each error kind end to end:
//!
//! | Scenario | Surfaced as | Trace code |
//! |----------|-------------|------------|
//! | no edge | `PermissionDenied` | `PERMISSION_ERROR` |
//! | level too low | `PermissionDenied` | `SECURITY_ERROR` |
//! | slow target | `Timeout` | `TIMEOUT_ERROR` |
//! | failing target | `Execution` | `EXECUTION_ERROR` |
//! | tripped edge | `CircuitOpen` | `CIRCUIT_OPEN` |

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{topics, InMemoryEventBus};
    use shared_store::{InMemoryStore, Store};
    use shared_types::{CallError, DenialReason, HandlerError, PermissionLevel, SecurityContext};

    use mr_01_circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitState};
    use mr_02_interaction_manager::{InteractionConfig, InteractionManager, InteractionTrace, TraceStatus};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Harness {
        store: Arc<InMemoryStore>,
        bus: Arc<InMemoryEventBus>,
        manager: InteractionManager,
        errors: Arc<Mutex<Vec<Value>>>,
    }

    fn harness(fallback_enabled: bool) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&bus) as Arc<dyn shared_bus::EventPublisher>,
            CircuitConfig::default(),
        ));
        let manager = InteractionManager::new(
            Arc::clone(&bus),
            Arc::clone(&store) as Arc<dyn Store>,
            breaker,
            InteractionConfig {
                fallback_enabled,
                ..InteractionConfig::default()
            },
        );

        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        bus.on(topics::INTERACTION_ERROR, move |_, payload| {
            seen.lock().push(payload.clone());
            Ok::<_, HandlerError>(())
        });

        Harness {
            store,
            bus,
            manager,
            errors,
        }
    }

    fn expose_echo(manager: &InteractionManager, target: &str) {
        manager.expose(target, |payload| async move {
            Ok::<_, HandlerError>(json!({ "echo": payload }))
        });
    }

    fn expose_failing(manager: &InteractionManager, target: &str) {
        manager.expose(target, |_| async move {
            Err::<Value, _>(HandlerError::new("disk full"))
        });
    }

    /// Every trace persisted for `source -> target`.
    fn traces(store: &InMemoryStore, source: &str, target: &str) -> Vec<InteractionTrace> {
        store
            .keys(Some(&format!("interaction.{source}.{target}.*")))
            .into_iter()
            .filter_map(|key| store.get(&key))
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }

    fn normal() -> SecurityContext {
        SecurityContext::new(PermissionLevel::Normal)
    }

    // =============================================================================
    // PERMISSIONS
    // =============================================================================

    #[tokio::test]
    async fn test_call_without_edge_is_denied() {
        let h = harness(true);
        expose_echo(&h.manager, "db");

        let err = h
            .manager
            .call("ui", "db", json!({ "q": 1 }), Some(&normal()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CallError::PermissionDenied {
                reason: DenialReason::Unregistered,
                ..
            }
        ));
        let trace = &traces(&h.store, "ui", "db")[0];
        assert_eq!(trace.status, TraceStatus::Error);
        assert_eq!(trace.error_type.as_deref(), Some("PERMISSION_ERROR"));
        assert_eq!(h.errors.lock()[0]["errorType"], json!("PERMISSION_ERROR"));
        assert_eq!(h.manager.edge_stats("ui", "db").unwrap().permission_errors, 1);
    }

    #[tokio::test]
    async fn test_insufficient_level_is_denied_even_with_fallback() {
        let h = harness(true);
        h.manager
            .register_edge("ui", "vault", PermissionLevel::Admin, None);
        expose_echo(&h.manager, "vault");

        let err = h
            .manager
            .call("ui", "vault", json!("secret"), Some(&normal()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CallError::PermissionDenied {
                reason: DenialReason::InsufficientLevel {
                    required: PermissionLevel::Admin,
                    actual: PermissionLevel::Normal,
                },
                ..
            }
        ));
        assert_eq!(h.manager.edge_stats("ui", "vault").unwrap().security_errors, 1);

        let admin = SecurityContext::new(PermissionLevel::Admin);
        let reply = h
            .manager
            .call("ui", "vault", json!("secret"), Some(&admin))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "echo": "secret" }));
    }

    #[tokio::test]
    async fn test_allowed_targets_follow_context_level() {
        let h = harness(true);
        h.manager.register_edge("ui", "db", PermissionLevel::Read, None);
        h.manager
            .register_edge("ui", "vault", PermissionLevel::Admin, None);

        assert_eq!(h.manager.allowed_targets("ui", Some(&normal())), vec!["db".to_string()]);
        assert!(h.manager.is_interaction_allowed("ui", "vault", None));
        assert!(!h.manager.is_interaction_allowed("db", "ui", None));
    }

    // =============================================================================
    // SUCCESSFUL CALLS
    // =============================================================================

    #[tokio::test]
    async fn test_successful_call_stores_trace_and_stats() {
        let h = harness(true);
        h.manager.register_edge("ui", "db", PermissionLevel::Read, None);
        expose_echo(&h.manager, "db");

        let reply = h
            .manager
            .call("ui", "db", json!({ "q": "users" }), Some(&normal()))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "echo": { "q": "users" } }));

        let traces = traces(&h.store, "ui", "db");
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].status, TraceStatus::Success);
        assert_eq!(traces[0].security_level, "NORMAL");
        assert!(traces[0].completed_at.is_some());

        let stats = h.manager.edge_stats("ui", "db").unwrap();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.successes, 1);
        assert!(h.errors.lock().is_empty());
    }

    // =============================================================================
    // FAILURES AND FALLBACKS
    // =============================================================================

    #[tokio::test]
    async fn test_slow_target_times_out() {
        let h = harness(false);
        h.manager.register_edge(
            "ui",
            "slow",
            PermissionLevel::Read,
            Some(Duration::from_millis(20)),
        );
        h.manager.expose("slow", |payload| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, HandlerError>(payload)
        });

        let err = h
            .manager
            .call("ui", "slow", json!(1), Some(&normal()))
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Timeout { timeout_ms: 20, .. }));
        assert_eq!(h.manager.edge_stats("ui", "slow").unwrap().timeouts, 1);
        assert_eq!(
            h.manager.breaker().circuit_info("ui:slow").unwrap().total_timeouts,
            1
        );
    }

    #[tokio::test]
    async fn test_failing_target_trips_circuit_without_fallback() {
        let h = harness(false);
        h.manager.register_edge("ui", "db", PermissionLevel::Read, None);
        expose_failing(&h.manager, "db");

        for _ in 0..3 {
            let err = h
                .manager
                .call("ui", "db", json!(null), Some(&normal()))
                .await
                .unwrap_err();
            assert!(matches!(err, CallError::Execution { .. }));
        }
        assert_eq!(h.manager.breaker().state("ui:db"), Some(CircuitState::Open));

        let err = h
            .manager
            .call("ui", "db", json!(null), Some(&normal()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::CircuitOpen { .. }));

        let kinds: Vec<Value> = h.errors.lock().iter().map(|e| e["errorType"].clone()).collect();
        assert_eq!(
            kinds,
            vec![
                json!("EXECUTION_ERROR"),
                json!("EXECUTION_ERROR"),
                json!("EXECUTION_ERROR"),
                json!("CIRCUIT_OPEN"),
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_answers_null_and_still_records_error() {
        let h = harness(true);
        h.manager.register_edge("ui", "db", PermissionLevel::Read, None);
        expose_failing(&h.manager, "db");

        let fallbacks = Arc::new(Mutex::new(0u32));
        let seen = Arc::clone(&fallbacks);
        h.bus.on(topics::CIRCUIT_FALLBACK, move |_, _| {
            *seen.lock() += 1;
            Ok::<_, HandlerError>(())
        });

        for _ in 0..4 {
            let reply = h
                .manager
                .call("ui", "db", json!(null), Some(&normal()))
                .await
                .unwrap();
            assert_eq!(reply, Value::Null);
        }

        assert_eq!(*fallbacks.lock(), 4);
        assert_eq!(h.errors.lock().len(), 4);
        let stats = h.manager.edge_stats("ui", "db").unwrap();
        assert_eq!(stats.errors, 3);
        assert_eq!(stats.fallbacks, 4);
        assert!(traces(&h.store, "ui", "db")
            .iter()
            .all(|t| t.status == TraceStatus::Error));
    }

    #[tokio::test]
    async fn test_missing_handler_is_execution_error() {
        let h = harness(false);
        h.manager.register_edge("ui", "ghost", PermissionLevel::Read, None);

        let err = h
            .manager
            .call("ui", "ghost", json!(1), Some(&normal()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Execution { .. }));
        assert!(err.to_string().contains("no handler exposed by ghost"));
    }
}
