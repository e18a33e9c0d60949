//! # Circuit Breaker Service
//!
//! Registry of circuits keyed by edge id, plus the `execute` wrapper that
//! applies a circuit's state, a deadline and an optional fallback around a
//! call.
//!
//! ```text
//!  execute(id, op, fallback?, timeout?)
//!     │
//!     ├─ admit ──Rejected──────────────────────────────► fallback | CircuitOpen
//!     │
//!     └─ Allowed ─► op() under timeout
//!                      ├─ Ok ─────► record_success ─► Completed(value)
//!                      ├─ Timeout ► record_failure(timed_out) ─┐
//!                      └─ Err ────► record_failure ────────────┴► fallback | error
//! ```
//!
//! Every mutation is persisted under `circuit.<id>` before any event is
//! emitted. Events are emitted after the registry lock is released, so
//! subscribers may query the breaker.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use shared_bus::{topics, EventPublisher};
use shared_store::Store;
use shared_types::{iso_now, key_stamp, unix_now, CallError, CallResult};
use tracing::{debug, info, warn};

use crate::config::{CircuitConfig, CircuitOverrides};
use crate::domain::{Admission, Circuit, CircuitRecord, CircuitState, Transition};
use crate::events::{LatencyEvent, StateChangeEvent};

/// Lifetime of latency and error samples written next to a circuit record.
pub const SAMPLE_TTL: Duration = Duration::from_secs(3600);

/// How a call through the breaker finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution<T> {
    /// The wrapped call returned a value.
    Completed(T),
    /// The call was rejected or failed and the fallback supplied `value`.
    Fallback { value: T, cause: CallError },
}

impl<T> Execution<T> {
    pub fn into_value(self) -> T {
        match self {
            Self::Completed(value) | Self::Fallback { value, .. } => value,
        }
    }

    #[must_use]
    pub fn cause(&self) -> Option<&CallError> {
        match self {
            Self::Completed(_) => None,
            Self::Fallback { cause, .. } => Some(cause),
        }
    }
}

/// Per-circuit metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitMetrics {
    pub circuit_id: String,
    pub state: CircuitState,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub open_count: u64,
    pub success_rate: f64,
    pub last_failure: Option<f64>,
    pub last_success: Option<f64>,
    pub last_state_change: f64,
}

/// Aggregate metrics across all circuits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerMetrics {
    pub total_circuits: usize,
    pub open_circuits: usize,
    pub half_open_circuits: usize,
    pub closed_circuits: usize,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub global_success_rate: f64,
    pub circuits: BTreeMap<String, CircuitState>,
}

/// Circuit breaker manager for all edges
pub struct CircuitBreaker {
    circuits: RwLock<HashMap<String, Circuit>>,
    defaults: CircuitConfig,
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
    sample_seq: AtomicU64,
}

impl CircuitBreaker {
    /// Create a breaker and rehydrate any circuits persisted in `store`.
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>, defaults: CircuitConfig) -> Self {
        let breaker = Self {
            circuits: RwLock::new(HashMap::new()),
            defaults,
            store,
            events,
            sample_seq: AtomicU64::new(0),
        };
        let loaded = breaker.load_from_store();
        if loaded > 0 {
            info!(circuits = loaded, "Circuit states restored from store");
        }
        breaker
    }

    #[must_use]
    pub fn defaults(&self) -> &CircuitConfig {
        &self.defaults
    }

    /// Load every `circuit.<id>` record. Returns how many were restored.
    ///
    /// Sample entries stored under the same prefix do not parse as records
    /// and are skipped.
    pub fn load_from_store(&self) -> usize {
        let mut restored = Vec::new();
        for key in self.store.keys(Some("circuit.*")) {
            let Some(id) = key.strip_prefix("circuit.") else {
                continue;
            };
            let Some(value) = self.store.get(&key) else {
                continue;
            };
            if let Ok(record) = serde_json::from_value::<CircuitRecord>(value) {
                restored.push(Circuit::from_record(id, record));
            }
        }

        let count = restored.len();
        let mut circuits = self.circuits.write();
        for circuit in restored {
            circuits.insert(circuit.id.clone(), circuit);
        }
        count
    }

    /// Create the circuit for `source:target`, or update its thresholds.
    pub fn register_circuit(&self, source: &str, target: &str, overrides: &CircuitOverrides) -> String {
        let id = format!("{source}:{target}");
        let mut circuits = self.circuits.write();
        match circuits.get_mut(&id) {
            Some(circuit) => {
                circuit.config.apply(overrides);
                self.persist(circuit);
                debug!(circuit_id = %id, "Circuit configuration updated");
            }
            None => {
                let config = self.defaults.clone().with(overrides);
                let circuit = Circuit::new(source, target, config, unix_now());
                self.persist(&circuit);
                circuits.insert(id.clone(), circuit);
                debug!(circuit_id = %id, "Circuit registered");
            }
        }
        id
    }

    /// Update thresholds of an existing circuit.
    pub fn update_configuration(&self, circuit_id: &str, overrides: &CircuitOverrides) -> bool {
        let mut circuits = self.circuits.write();
        let Some(circuit) = circuits.get_mut(circuit_id) else {
            return false;
        };
        circuit.config.apply(overrides);
        self.persist(circuit);
        info!(circuit_id, config = ?circuit.config, "Circuit configuration updated");
        true
    }

    /// Manually return a circuit to CLOSED.
    pub fn reset(&self, circuit_id: &str) -> bool {
        if !self.circuits.read().contains_key(circuit_id) {
            return false;
        }
        self.mutate(circuit_id, |c, now| ((), c.reset(now)));
        info!(circuit_id, "Circuit reset manually");
        true
    }

    /// Run `op` through the circuit; errors propagate to the caller.
    pub async fn execute<T, E, F, Fut>(
        &self,
        circuit_id: &str,
        op: F,
        timeout: Option<Duration>,
    ) -> CallResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run(circuit_id, op, None::<fn(&CallError) -> T>, timeout)
            .await
            .map(Execution::into_value)
    }

    /// Run `op` through the circuit; a rejection or failure is absorbed by
    /// `fallback` and reported as [`Execution::Fallback`].
    pub async fn execute_with_fallback<T, E, F, Fut, FB>(
        &self,
        circuit_id: &str,
        op: F,
        fallback: FB,
        timeout: Option<Duration>,
    ) -> CallResult<Execution<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        FB: FnOnce(&CallError) -> T,
    {
        self.run(circuit_id, op, Some(fallback), timeout).await
    }

    async fn run<T, E, F, Fut, FB>(
        &self,
        circuit_id: &str,
        op: F,
        fallback: Option<FB>,
        timeout: Option<Duration>,
    ) -> CallResult<Execution<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        FB: FnOnce(&CallError) -> T,
    {
        if self.mutate(circuit_id, |c, now| c.admit(now)) == Admission::Rejected {
            debug!(circuit_id, "Circuit breaker is open, rejecting call");
            let cause = CallError::CircuitOpen {
                circuit_id: circuit_id.to_string(),
            };
            return degrade(cause, fallback);
        }

        let started = Instant::now();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result.map_err(|e| execution_error(circuit_id, &e)),
                Err(_) => Err(CallError::Timeout {
                    circuit_id: circuit_id.to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => op().await.map_err(|e| execution_error(circuit_id, &e)),
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(value) => {
                self.on_success(circuit_id, duration_ms);
                Ok(Execution::Completed(value))
            }
            Err(cause) => {
                self.on_failure(circuit_id, &cause);
                degrade(cause, fallback)
            }
        }
    }

    fn on_success(&self, circuit_id: &str, duration_ms: f64) {
        self.mutate(circuit_id, |c, now| ((), c.record_success(now)));

        let now = unix_now();
        self.store.set_with_ttl(
            &self.sample_key(circuit_id, "latency", now),
            json!({ "durationMs": duration_ms, "timestamp": now }),
            SAMPLE_TTL,
        );
        let event = LatencyEvent {
            circuit_id: circuit_id.to_string(),
            duration_ms,
            timestamp: now,
        };
        self.publish(topics::CIRCUIT_LATENCY, &event);
    }

    fn on_failure(&self, circuit_id: &str, cause: &CallError) {
        let timed_out = matches!(cause, CallError::Timeout { .. });
        self.mutate(circuit_id, |c, now| ((), c.record_failure(now, timed_out)));

        let now = unix_now();
        self.store.set_with_ttl(
            &self.sample_key(circuit_id, "error", now),
            json!({ "error": cause.to_string(), "timeout": timed_out, "timestamp": now }),
            SAMPLE_TTL,
        );
        debug!(circuit_id, error = %cause, "Circuit recorded failure");
    }

    /// Apply `f` to the circuit (auto-registering it), persist, then announce
    /// any transition once the lock is released.
    fn mutate<R>(&self, circuit_id: &str, f: impl FnOnce(&mut Circuit, f64) -> (R, Option<Transition>)) -> R {
        let now = unix_now();
        let (result, announcement) = {
            let mut circuits = self.circuits.write();
            let circuit = circuits.entry(circuit_id.to_string()).or_insert_with(|| {
                debug!(circuit_id, "Auto-registering circuit with defaults");
                Circuit::for_id(circuit_id, self.defaults.clone(), now)
            });
            let (result, transition) = f(circuit, now);
            self.persist(circuit);
            let announcement = transition.map(|t| StateChangeEvent {
                circuit_id: circuit_id.to_string(),
                old_state: t.from,
                new_state: t.to,
                timestamp: iso_now(),
                source: circuit.source.clone(),
                target: circuit.target.clone(),
            });
            (result, announcement)
        };

        if let Some(event) = announcement {
            self.announce(&event);
        }
        result
    }

    fn announce(&self, event: &StateChangeEvent) {
        if event.new_state == CircuitState::Open {
            warn!(
                circuit_id = %event.circuit_id,
                from = %event.old_state,
                "Circuit breaker opened"
            );
        } else {
            info!(
                circuit_id = %event.circuit_id,
                from = %event.old_state,
                to = %event.new_state,
                "Circuit breaker state changed"
            );
        }

        let now = unix_now();
        self.store.set_with_ttl(
            &self.sample_key(&event.circuit_id, "state_change", now),
            json!({ "from": event.old_state, "to": event.new_state, "timestamp": now }),
            SAMPLE_TTL,
        );
        self.publish(topics::CIRCUIT_STATE_CHANGE, event);
    }

    fn publish<P: Serialize>(&self, name: &str, payload: &P) {
        match serde_json::to_value(payload) {
            Ok(value) => {
                self.events.emit(name, value);
            }
            Err(e) => warn!(event = name, error = %e, "Failed to encode event payload"),
        }
    }

    fn persist(&self, circuit: &Circuit) {
        match serde_json::to_value(CircuitRecord::from(circuit)) {
            Ok(value) => self.store.set(&format!("circuit.{}", circuit.id), value),
            Err(e) => warn!(circuit_id = %circuit.id, error = %e, "Failed to persist circuit"),
        }
    }

    fn sample_key(&self, circuit_id: &str, kind: &str, now: f64) -> String {
        let seq = self.sample_seq.fetch_add(1, Ordering::Relaxed);
        format!("circuit.{circuit_id}.{kind}.{}-{seq}", key_stamp(now))
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn state(&self, circuit_id: &str) -> Option<CircuitState> {
        self.circuits.read().get(circuit_id).map(|c| c.state)
    }

    #[must_use]
    pub fn circuit_info(&self, circuit_id: &str) -> Option<CircuitRecord> {
        self.circuits.read().get(circuit_id).map(CircuitRecord::from)
    }

    #[must_use]
    pub fn list_circuits(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.circuits.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn all_circuits(&self) -> BTreeMap<String, CircuitRecord> {
        self.circuits
            .read()
            .iter()
            .map(|(id, c)| (id.clone(), CircuitRecord::from(c)))
            .collect()
    }

    #[must_use]
    pub fn circuit_metrics(&self, circuit_id: &str) -> Option<CircuitMetrics> {
        self.circuits.read().get(circuit_id).map(|c| CircuitMetrics {
            circuit_id: c.id.clone(),
            state: c.state,
            total_successes: c.total_successes,
            total_failures: c.total_failures,
            total_timeouts: c.total_timeouts,
            open_count: c.open_count,
            success_rate: c.success_rate(),
            last_failure: c.last_failure_time,
            last_success: c.last_success_time,
            last_state_change: c.last_state_change,
        })
    }

    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        let circuits = self.circuits.read();
        let count_in = |state| circuits.values().filter(|c| c.state == state).count();
        let open_circuits = count_in(CircuitState::Open);
        let half_open_circuits = count_in(CircuitState::HalfOpen);

        let total_successes: u64 = circuits.values().map(|c| c.total_successes).sum();
        let total_failures: u64 = circuits.values().map(|c| c.total_failures).sum();
        let total_timeouts: u64 = circuits.values().map(|c| c.total_timeouts).sum();
        let finished = total_successes + total_failures;

        BreakerMetrics {
            total_circuits: circuits.len(),
            open_circuits,
            half_open_circuits,
            closed_circuits: circuits.len() - open_circuits - half_open_circuits,
            total_successes,
            total_failures,
            total_timeouts,
            global_success_rate: if finished == 0 {
                0.0
            } else {
                total_successes as f64 / finished as f64
            },
            circuits: circuits.iter().map(|(id, c)| (id.clone(), c.state)).collect(),
        }
    }
}

fn execution_error(circuit_id: &str, error: &dyn fmt::Display) -> CallError {
    CallError::Execution {
        circuit_id: circuit_id.to_string(),
        message: error.to_string(),
    }
}

fn degrade<T, FB>(cause: CallError, fallback: Option<FB>) -> CallResult<Execution<T>>
where
    FB: FnOnce(&CallError) -> T,
{
    match fallback {
        Some(fallback) => {
            let value = fallback(&cause);
            Ok(Execution::Fallback { value, cause })
        }
        None => Err(cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::Value;
    use shared_bus::InMemoryEventBus;
    use shared_store::InMemoryStore;

    fn test_config() -> CircuitConfig {
        CircuitConfig {
            max_failures: 3,
            reset_timeout: Duration::from_millis(50),
            half_open_max_calls: 2,
            success_threshold: 2,
        }
    }

    fn setup() -> (CircuitBreaker, Arc<InMemoryStore>, Arc<InMemoryEventBus>) {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let breaker = CircuitBreaker::new(store.clone(), bus.clone(), test_config());
        (breaker, store, bus)
    }

    fn capture(bus: &InMemoryEventBus, pattern: &str) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(pattern, move |_, payload| {
            sink.lock().push(payload.clone());
            Ok(())
        });
        seen
    }

    async fn fail(breaker: &CircuitBreaker, id: &str) -> CallResult<u32> {
        breaker
            .execute(id, || async { Err::<u32, _>("boom") }, None)
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, id: &str) -> CallResult<u32> {
        breaker
            .execute(id, || async { Ok::<_, String>(7) }, None)
            .await
    }

    #[tokio::test]
    async fn test_auto_registers_on_first_execute() {
        let (breaker, store, _bus) = setup();
        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));

        let info = breaker.circuit_info("ui:db").unwrap();
        assert_eq!(info.source, "ui");
        assert_eq!(info.target, "db");
        assert_eq!(info.total_successes, 1);
        assert!(store.has("circuit.ui:db"));
    }

    #[tokio::test]
    async fn test_opens_after_max_failures_and_fails_fast() {
        let (breaker, _store, bus) = setup();
        let changes = capture(&bus, topics::CIRCUIT_STATE_CHANGE);

        for _ in 0..3 {
            assert!(matches!(fail(&breaker, "ui:db").await, Err(CallError::Execution { .. })));
        }
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::Open));
        assert_eq!(breaker.circuit_info("ui:db").unwrap().open_count, 1);

        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let result = breaker
            .execute(
                "ui:db",
                || async move {
                    *flag.lock() = true;
                    Ok::<_, String>(1)
                },
                None,
            )
            .await;
        assert_eq!(
            result,
            Err(CallError::CircuitOpen {
                circuit_id: "ui:db".into()
            })
        );
        assert!(!*called.lock());

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["oldState"], "CLOSED");
        assert_eq!(changes[0]["newState"], "OPEN");
        assert_eq!(changes[0]["source"], "ui");
        assert_eq!(changes[0]["target"], "db");
    }

    #[tokio::test]
    async fn test_half_open_after_reset_timeout_then_closes() {
        let (breaker, _store, _bus) = setup();
        for _ in 0..3 {
            let _ = fail(&breaker, "ui:db").await;
        }
        tokio::time::sleep(Duration::from_millis(70)).await;

        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::HalfOpen));
        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::Closed));

        let info = breaker.circuit_info("ui:db").unwrap();
        assert_eq!(info.failure_count, 0);
    }

    #[tokio::test]
    async fn test_default_config_closes_after_reset() {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let breaker = CircuitBreaker::new(
            store,
            bus,
            CircuitConfig {
                reset_timeout: Duration::from_millis(30),
                ..CircuitConfig::default()
            },
        );
        for _ in 0..3 {
            let _ = fail(&breaker, "ui:db").await;
        }
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::Open));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));
        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_half_open_quota_exhaustion_uses_fallback() {
        let (breaker, _store, _bus) = setup();
        breaker.register_circuit(
            "ui",
            "db",
            &CircuitOverrides {
                half_open_max_calls: Some(1),
                success_threshold: Some(3),
                ..CircuitOverrides::default()
            },
        );
        for _ in 0..3 {
            let _ = fail(&breaker, "ui:db").await;
        }
        tokio::time::sleep(Duration::from_millis(70)).await;

        // Leaving OPEN is free; the one half-open slot goes to the next call.
        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));
        assert_eq!(succeed(&breaker, "ui:db").await, Ok(7));
        let second = breaker
            .execute_with_fallback("ui:db", || async { Ok::<_, String>(7) }, |_| 0, None)
            .await
            .unwrap();
        assert_eq!(second.cause(), Some(&CallError::CircuitOpen { circuit_id: "ui:db".into() }));
        assert_eq!(second.into_value(), 0);
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::HalfOpen));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let (breaker, _store, _bus) = setup();
        let result = breaker
            .execute(
                "ui:slow",
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, String>(1)
                },
                Some(Duration::from_millis(20)),
            )
            .await;

        assert_eq!(
            result,
            Err(CallError::Timeout {
                circuit_id: "ui:slow".into(),
                timeout_ms: 20
            })
        );
        let info = breaker.circuit_info("ui:slow").unwrap();
        assert_eq!(info.total_timeouts, 1);
        assert_eq!(info.failure_count, 1);
    }

    #[tokio::test]
    async fn test_fallback_absorbs_failure_but_counts_it() {
        let (breaker, _store, _bus) = setup();
        let outcome = breaker
            .execute_with_fallback("ui:db", || async { Err::<u32, _>("down") }, |_| 42, None)
            .await
            .unwrap();

        assert!(matches!(outcome, Execution::Fallback { value: 42, .. }));
        assert_eq!(breaker.circuit_info("ui:db").unwrap().total_failures, 1);
    }

    #[tokio::test]
    async fn test_success_emits_latency_event() {
        let (breaker, store, bus) = setup();
        let latencies = capture(&bus, topics::CIRCUIT_LATENCY);
        succeed(&breaker, "ui:db").await.unwrap();

        let latencies = latencies.lock();
        assert_eq!(latencies.len(), 1);
        assert_eq!(latencies[0]["circuitId"], "ui:db");
        assert!(latencies[0]["durationMs"].as_f64().unwrap() >= 0.0);
        assert_eq!(store.keys(Some("circuit.ui:db.latency.*")).len(), 1);
    }

    #[tokio::test]
    async fn test_counters_stay_mutually_exclusive() {
        let (breaker, _store, _bus) = setup();
        let _ = succeed(&breaker, "a:b").await;
        let _ = fail(&breaker, "a:b").await;
        let _ = succeed(&breaker, "a:b").await;
        let _ = succeed(&breaker, "a:b").await;
        let _ = fail(&breaker, "a:b").await;

        let info = breaker.circuit_info("a:b").unwrap();
        assert!(info.failure_count == 0 || info.success_count == 0);
        assert_eq!(info.failure_count, 1);
    }

    #[tokio::test]
    async fn test_persisted_state_survives_restart() {
        let (breaker, store, bus) = setup();
        breaker.register_circuit(
            "ui",
            "db",
            &CircuitOverrides {
                max_failures: Some(2),
                ..CircuitOverrides::default()
            },
        );
        let _ = fail(&breaker, "ui:db").await;
        let _ = fail(&breaker, "ui:db").await;
        let before = breaker.circuit_info("ui:db").unwrap();
        assert_eq!(before.state, CircuitState::Open);

        let restarted = CircuitBreaker::new(store, bus, test_config());
        assert_eq!(restarted.circuit_info("ui:db"), Some(before));
        assert_eq!(restarted.list_circuits(), vec!["ui:db".to_string()]);
    }

    #[tokio::test]
    async fn test_reset_and_metrics() {
        let (breaker, _store, _bus) = setup();
        for _ in 0..3 {
            let _ = fail(&breaker, "ui:db").await;
        }
        let _ = succeed(&breaker, "ui:cache").await;

        let metrics = breaker.metrics();
        assert_eq!(metrics.total_circuits, 2);
        assert_eq!(metrics.open_circuits, 1);
        assert_eq!(metrics.closed_circuits, 1);
        assert_eq!(metrics.global_success_rate, 0.25);

        assert!(breaker.reset("ui:db"));
        assert!(!breaker.reset("missing"));
        assert_eq!(breaker.state("ui:db"), Some(CircuitState::Closed));
        assert_eq!(breaker.circuit_metrics("ui:db").unwrap().open_count, 1);
    }
}
