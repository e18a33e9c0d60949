//! # Interaction Manager Service
//!
//! Every cross-module call passes through [`InteractionManager::call`]:
//!
//! ```text
//!   call(source, target, payload, ctx?)
//!     │
//!     ├─ trace `pending`, requests += 1
//!     ├─ permission edge? ──no──► PERMISSION_ERROR ──────────────┐
//!     ├─ ctx level ok?   ──no──► SECURITY_ERROR ────────────────┤
//!     ├─ resolve deadline (edge, source:*, default)             │
//!     └─ CircuitBreaker::execute_with_fallback                  │
//!          │  emit   module:call:<target>  {from, payload}      │
//!          │  join   module:handle:<target>                     │
//!          ├─ Completed ─► trace `success`, telemetry           │
//!          └─ Fallback / Err ─► trace `error` ◄─────────────────┘
//!                              module:interaction_error
//! ```
//!
//! Permission errors are never absorbed by a fallback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mr_01_circuit_breaker::{CircuitBreaker, CircuitOverrides, Execution};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use shared_bus::{topics, EventPublisher, HandlerOutcome, InMemoryEventBus, SubscriptionId};
use shared_store::Store;
use shared_types::{
    iso_now, key_stamp, unix_now, CallError, CallResult, ErrorKind, HandlerError, PermissionLevel,
    SecurityContext,
};
use tracing::{debug, error, warn};

use crate::config::InteractionConfig;
use crate::domain::{
    Counter, EdgeStats, InteractionTrace, PermissionRegistry, StatsBook, StatsScope, StatsSummary,
    TimeoutTable,
};
use crate::ports::InteractionApi;

/// Mediator for calls between modules.
pub struct InteractionManager {
    config: InteractionConfig,
    bus: Arc<InMemoryEventBus>,
    store: Arc<dyn Store>,
    breaker: Arc<CircuitBreaker>,
    permissions: RwLock<PermissionRegistry>,
    timeouts: RwLock<TimeoutTable>,
    stats: Mutex<StatsBook>,
    trace_seq: AtomicU64,
}

impl InteractionManager {
    pub fn new(
        bus: Arc<InMemoryEventBus>,
        store: Arc<dyn Store>,
        breaker: Arc<CircuitBreaker>,
        config: InteractionConfig,
    ) -> Self {
        debug!(default_timeout = ?config.default_timeout, "InteractionManager initialised");
        Self {
            timeouts: RwLock::new(TimeoutTable::new(config.default_timeout)),
            config,
            bus,
            store,
            breaker,
            permissions: RwLock::new(PermissionRegistry::default()),
            stats: Mutex::new(StatsBook::default()),
            trace_seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Allow `source` to call `target`; also registers the edge's circuit.
    pub fn register_edge(
        &self,
        source: &str,
        target: &str,
        level: PermissionLevel,
        timeout: Option<Duration>,
    ) {
        self.permissions.write().register(source, target, level);
        self.breaker
            .register_circuit(source, target, &CircuitOverrides::default());
        if let Some(timeout) = timeout {
            self.set_timeout(source, target, timeout);
        }
        debug!(source, target, level = %level, "Registered interaction");
    }

    /// Deadline for one edge, or for every edge of `source` when `target`
    /// is `"*"`.
    pub fn set_timeout(&self, source: &str, target: &str, timeout: Duration) {
        self.timeouts.write().set(source, target, timeout);
        debug!(source, target, ?timeout, "Timeout set");
    }

    /// Register `target`'s handler for mediated calls.
    pub fn expose<F, Fut>(&self, target: &str, handler: F) -> SubscriptionId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.bus
            .on_async(&topics::module_handle(target), move |_, payload| handler(payload))
    }

    // =========================================================================
    // CALL PATH
    // =========================================================================

    /// Mediated call from `source` to `target`.
    pub async fn call(
        &self,
        source: &str,
        target: &str,
        payload: Value,
        context: Option<&SecurityContext>,
    ) -> CallResult<Value> {
        let circuit_id = format!("{source}:{target}");
        let trace_key = self.trace_key(source, target);
        let mut trace = InteractionTrace::pending(source, target, &payload, context);
        self.save_trace(&trace_key, &trace);
        self.stats.lock().bump(source, target, Counter::Requests);

        let checked = self.permissions.read().check(source, target, context);
        if let Err(denied) = checked {
            let counter = if denied.kind() == ErrorKind::Security {
                Counter::SecurityErrors
            } else {
                Counter::PermissionErrors
            };
            self.stats.lock().bump(source, target, counter);
            self.record_error(&trace_key, &mut trace, &denied);
            return Err(denied);
        }

        let timeout = self.timeouts.read().resolve(source, target);
        let started = Instant::now();
        let outcome = if self.config.fallback_enabled {
            self.breaker
                .execute_with_fallback(
                    &circuit_id,
                    || self.dispatch(source, target, payload),
                    |_| self.fallback(source, target),
                    Some(timeout),
                )
                .await
        } else {
            self.breaker
                .execute(&circuit_id, || self.dispatch(source, target, payload), Some(timeout))
                .await
                .map(Execution::Completed)
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(Execution::Completed(value)) => {
                trace.succeed();
                self.save_trace(&trace_key, &trace);
                self.stats.lock().bump(source, target, Counter::Successes);
                if self.config.telemetry_enabled {
                    self.publish(
                        topics::TELEMETRY_INTERACTION,
                        json!({
                            "traceKey": trace_key,
                            "source": source,
                            "target": target,
                            "success": true,
                        }),
                    );
                }
                self.record_latency(source, target, duration_ms);
                Ok(value)
            }
            Ok(Execution::Fallback { value, cause }) => {
                self.record_call_failure(source, target, &trace_key, &mut trace, &cause, duration_ms);
                Ok(value)
            }
            Err(cause) => {
                self.record_call_failure(source, target, &trace_key, &mut trace, &cause, duration_ms);
                Err(cause)
            }
        }
    }

    async fn dispatch(&self, source: &str, target: &str, payload: Value) -> Result<Value, HandlerError> {
        self.publish(
            &topics::module_call(target),
            json!({ "from": source, "payload": payload.clone() }),
        );
        let outcomes = self
            .bus
            .emit_and_collect(&topics::module_handle(target), payload)
            .await;
        collect_reply(target, outcomes)
    }

    fn fallback(&self, source: &str, target: &str) -> Value {
        warn!(source, target, "Circuit open or call failed, using fallback");
        self.stats.lock().bump(source, target, Counter::Fallbacks);
        self.publish(
            topics::CIRCUIT_FALLBACK,
            json!({ "source": source, "target": target }),
        );
        Value::Null
    }

    fn record_call_failure(
        &self,
        source: &str,
        target: &str,
        trace_key: &str,
        trace: &mut InteractionTrace,
        cause: &CallError,
        duration_ms: f64,
    ) {
        match cause.kind() {
            ErrorKind::Timeout => self.stats.lock().bump(source, target, Counter::Timeouts),
            ErrorKind::Execution => self.stats.lock().bump(source, target, Counter::Errors),
            _ => {}
        }
        self.record_error(trace_key, trace, cause);

        // Fast-failed calls never reached the target.
        if !matches!(cause, CallError::CircuitOpen { .. }) {
            self.record_latency(source, target, duration_ms);
        }
    }

    fn record_error(&self, trace_key: &str, trace: &mut InteractionTrace, cause: &CallError) {
        let error_type = cause.kind().trace_code();
        error!(trace_key, error_type, error = %cause, "Interaction failed");

        trace.fail(cause);
        self.save_trace(trace_key, trace);
        self.publish(
            topics::INTERACTION_ERROR,
            json!({
                "traceKey": trace_key,
                "errorType": error_type,
                "error": cause.to_string(),
                "source": trace.source,
                "target": trace.target,
            }),
        );
    }

    fn record_latency(&self, source: &str, target: &str, duration_ms: f64) {
        self.stats
            .lock()
            .edge_mut(source, target)
            .record_latency(duration_ms);

        if self.config.telemetry_enabled {
            self.publish(
                topics::TELEMETRY_LATENCY,
                json!({
                    "source": source,
                    "target": target,
                    "durationMs": duration_ms,
                    "timestamp": iso_now(),
                }),
            );
        }
    }

    fn trace_key(&self, source: &str, target: &str) -> String {
        let seq = self.trace_seq.fetch_add(1, Ordering::Relaxed);
        format!("interaction.{source}.{target}.{}-{seq}", key_stamp(unix_now()))
    }

    fn save_trace(&self, trace_key: &str, trace: &InteractionTrace) {
        match serde_json::to_value(trace) {
            Ok(value) => self.store.set(trace_key, value),
            Err(e) => warn!(trace_key, error = %e, "Failed to persist trace"),
        }
    }

    fn publish<P: Serialize>(&self, name: &str, payload: P) {
        match serde_json::to_value(payload) {
            Ok(value) => {
                self.bus.emit(name, value);
            }
            Err(e) => warn!(event = name, error = %e, "Failed to encode event payload"),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn is_interaction_allowed(
        &self,
        source: &str,
        target: &str,
        context: Option<&SecurityContext>,
    ) -> bool {
        self.permissions.read().check(source, target, context).is_ok()
    }

    #[must_use]
    pub fn allowed_targets(&self, source: &str, context: Option<&SecurityContext>) -> Vec<String> {
        self.permissions.read().allowed_targets(source, context)
    }

    #[must_use]
    pub fn allowed_sources(&self, target: &str, context: Option<&SecurityContext>) -> Vec<String> {
        self.permissions.read().allowed_sources(target, context)
    }

    #[must_use]
    pub fn stats(&self) -> StatsSummary {
        self.stats.lock().summary()
    }

    #[must_use]
    pub fn source_stats(&self, source: &str) -> Option<StatsSummary> {
        self.stats.lock().source_summary(source)
    }

    #[must_use]
    pub fn edge_stats(&self, source: &str, target: &str) -> Option<EdgeStats> {
        self.stats.lock().edge(source, target)
    }

    pub fn reset_stats(&self, scope: &StatsScope) {
        self.stats.lock().reset(scope);
        debug!(?scope, "Interaction statistics reset");
    }
}

/// Reduce the target's handler outcomes to one reply.
///
/// A single async reply is returned as-is; several become an array. A
/// failing handler fails the call.
fn collect_reply(target: &str, outcomes: Vec<HandlerOutcome>) -> Result<Value, HandlerError> {
    let mut replies = Vec::new();
    for outcome in outcomes {
        if let Some(value) = outcome? {
            replies.push(value);
        }
    }

    match replies.len() {
        0 => Err(HandlerError::new(format!("no handler exposed by {target}"))),
        1 => Ok(replies.swap_remove(0)),
        _ => Ok(Value::Array(replies)),
    }
}

#[async_trait]
impl InteractionApi for InteractionManager {
    fn register_edge(
        &self,
        source: &str,
        target: &str,
        level: PermissionLevel,
        timeout: Option<Duration>,
    ) {
        InteractionManager::register_edge(self, source, target, level, timeout);
    }

    async fn call(
        &self,
        source: &str,
        target: &str,
        payload: Value,
        context: Option<&SecurityContext>,
    ) -> CallResult<Value> {
        InteractionManager::call(self, source, target, payload, context).await
    }

    fn is_interaction_allowed(
        &self,
        source: &str,
        target: &str,
        context: Option<&SecurityContext>,
    ) -> bool {
        InteractionManager::is_interaction_allowed(self, source, target, context)
    }
}
