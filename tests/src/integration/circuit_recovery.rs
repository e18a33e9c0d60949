//! # Circuit Recovery
//!
//! A failing edge walks the full breaker cycle:
//!
//! ```text
//! CLOSED --3 failures--> OPEN --reset timeout--> HALF_OPEN --2 successes--> CLOSED
//! ```
//!
//! Every transition is observed on `circuit:state_change` and persisted, so
//! a breaker built later over the same store resumes where the first stopped.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{topics, EventPublisher, InMemoryEventBus};
    use shared_store::{InMemoryStore, Store};
    use shared_types::{CallError, HandlerError};

    use mr_01_circuit_breaker::{
        CircuitBreaker, CircuitConfig, CircuitOverrides, CircuitRecord, CircuitState, Execution,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const EDGE: &str = "api:db";
    const RESET: Duration = Duration::from_millis(50);

    struct Harness {
        store: Arc<InMemoryStore>,
        bus: Arc<InMemoryEventBus>,
        breaker: CircuitBreaker,
        transitions: Arc<Mutex<Vec<(String, String)>>>,
    }

    /// Breaker with default settings apart from a short reset timeout.
    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let transitions = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&transitions);
        bus.on(topics::CIRCUIT_STATE_CHANGE, move |_, payload| {
            let field = |k: &str| payload.get(k).and_then(Value::as_str).unwrap_or("").to_string();
            seen.lock().push((field("oldState"), field("newState")));
            Ok::<_, HandlerError>(())
        });

        let breaker = CircuitBreaker::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&bus) as Arc<dyn EventPublisher>,
            CircuitConfig::default(),
        );
        breaker.register_circuit(
            "api",
            "db",
            &CircuitOverrides {
                reset_timeout: Some(RESET),
                ..CircuitOverrides::default()
            },
        );

        Harness {
            store,
            bus,
            breaker,
            transitions,
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<Value, CallError> {
        breaker
            .execute(EDGE, || async { Err::<Value, _>("connection refused") }, None)
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<Value, CallError> {
        breaker
            .execute(EDGE, || async { Ok::<_, String>(json!("ok")) }, None)
            .await
    }

    /// Drive the circuit to OPEN through three failures.
    async fn trip(breaker: &CircuitBreaker) {
        for _ in 0..3 {
            let err = fail(breaker).await.unwrap_err();
            assert!(matches!(err, CallError::Execution { .. }));
        }
        assert_eq!(breaker.state(EDGE), Some(CircuitState::Open));
    }

    // =============================================================================
    // FULL CYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_breaker_walks_full_cycle() {
        let h = harness();

        // Two failures keep the circuit closed.
        fail(&h.breaker).await.unwrap_err();
        fail(&h.breaker).await.unwrap_err();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::Closed));

        fail(&h.breaker).await.unwrap_err();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::Open));

        // Before the reset timeout the target is never invoked.
        let invoked = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&invoked);
        let err = h
            .breaker
            .execute(
                EDGE,
                move || async move {
                    *counter.lock() += 1;
                    Ok::<_, String>(json!("ok"))
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::CircuitOpen { .. }));
        assert_eq!(*invoked.lock(), 0);

        tokio::time::sleep(RESET * 2).await;

        succeed(&h.breaker).await.unwrap();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::HalfOpen));
        succeed(&h.breaker).await.unwrap();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::Closed));

        let info = h.breaker.circuit_info(EDGE).unwrap();
        assert_eq!(info.failure_count, 0);
        assert_eq!(info.open_count, 1);
        assert_eq!(info.total_failures, 3);
        assert_eq!(info.total_successes, 2);

        assert_eq!(
            *h.transitions.lock(),
            vec![
                ("CLOSED".to_string(), "OPEN".to_string()),
                ("OPEN".to_string(), "HALF_OPEN".to_string()),
                ("HALF_OPEN".to_string(), "CLOSED".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_circuit() {
        let h = harness();
        trip(&h.breaker).await;
        tokio::time::sleep(RESET * 2).await;

        // failure_count survives into HALF_OPEN, so one failed call reopens.
        fail(&h.breaker).await.unwrap_err();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::Open));
        assert_eq!(h.breaker.circuit_info(EDGE).unwrap().open_count, 2);
    }

    #[tokio::test]
    async fn test_half_open_quota_fails_fast() {
        let h = harness();
        h.breaker.update_configuration(
            EDGE,
            &CircuitOverrides {
                success_threshold: Some(3),
                ..CircuitOverrides::default()
            },
        );
        trip(&h.breaker).await;
        tokio::time::sleep(RESET * 2).await;

        // Leaving OPEN does not use the single half-open slot.
        succeed(&h.breaker).await.unwrap();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::HalfOpen));
        succeed(&h.breaker).await.unwrap();
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::HalfOpen));

        // The slot is used up one success short of the threshold.
        let err = succeed(&h.breaker).await.unwrap_err();
        assert!(matches!(err, CallError::CircuitOpen { .. }));
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::HalfOpen));
    }

    #[tokio::test]
    async fn test_fallback_absorbs_open_circuit() {
        let h = harness();
        trip(&h.breaker).await;

        let outcome = h
            .breaker
            .execute_with_fallback(
                EDGE,
                || async { Ok::<_, String>(json!("live")) },
                |_| json!("cached"),
                None,
            )
            .await
            .unwrap();

        assert!(matches!(outcome.cause(), Some(CallError::CircuitOpen { .. })));
        assert_eq!(outcome.into_value(), json!("cached"));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let h = harness();
        for _ in 0..3 {
            let err = h
                .breaker
                .execute(
                    EDGE,
                    || async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok::<_, String>(json!("late"))
                    },
                    Some(Duration::from_millis(10)),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, CallError::Timeout { .. }));
        }

        let info = h.breaker.circuit_info(EDGE).unwrap();
        assert_eq!(info.total_timeouts, 3);
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::Open));
    }

    // =============================================================================
    // PERSISTENCE
    // =============================================================================

    #[tokio::test]
    async fn test_persisted_record_restores_open_circuit() {
        let h = harness();
        trip(&h.breaker).await;

        let stored: CircuitRecord =
            serde_json::from_value(h.store.get("circuit.api:db").unwrap()).unwrap();
        assert_eq!(stored.state, CircuitState::Open);
        assert_eq!(stored.failure_count, 3);
        assert_eq!(stored.source, "api");
        assert_eq!(stored.target, "db");

        let restored = CircuitBreaker::new(
            Arc::clone(&h.store) as Arc<dyn Store>,
            Arc::clone(&h.bus) as Arc<dyn EventPublisher>,
            CircuitConfig::default(),
        );
        assert_eq!(restored.list_circuits(), vec![EDGE.to_string()]);
        assert_eq!(restored.circuit_info(EDGE).unwrap(), stored);

        // The restored circuit keeps its short reset timeout.
        tokio::time::sleep(RESET * 2).await;
        succeed(&restored).await.unwrap();
        assert_eq!(restored.state(EDGE), Some(CircuitState::HalfOpen));
    }

    #[tokio::test]
    async fn test_manual_reset_closes_circuit() {
        let h = harness();
        trip(&h.breaker).await;

        assert!(h.breaker.reset(EDGE));
        assert!(!h.breaker.reset("missing:edge"));
        assert_eq!(h.breaker.state(EDGE), Some(CircuitState::Closed));
        succeed(&h.breaker).await.unwrap();

        let metrics = h.breaker.metrics();
        assert_eq!(metrics.open_circuits, 0);
    }

    #[tokio::test]
    async fn test_execution_variant_reports_completion() {
        let h = harness();
        let outcome = h
            .breaker
            .execute_with_fallback(EDGE, || async { Ok::<_, String>(1) }, |_| 0, None)
            .await
            .unwrap();
        assert!(matches!(outcome, Execution::Completed(1)));
        assert!(outcome.cause().is_none());
    }
}
