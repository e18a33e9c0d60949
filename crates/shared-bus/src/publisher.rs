//! # Event Publisher
//!
//! Name-pattern publish/subscribe registry.
//!
//! ## Resolution
//!
//! Exact-name subscriptions live in a map keyed by pattern string. Patterns
//! containing a wildcard are also tracked in a separate index that is scanned
//! on every emit. Matches from both are delivered in registration order.
//!
//! ```text
//!   emit("sys:started")
//!        │
//!        ├── exact["sys:started"]          ──┐
//!        └── wildcards: "sys:*" ✓  "db:*" ✗ ─┴──► sort by seq ──► handlers
//! ```

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use shared_types::{is_wildcard, wildcard_match, HandlerError};
use tracing::{debug, error, warn};

use crate::subscriber::{Handler, Subscription, SubscriptionId};
use crate::supervisor::TaskSupervisor;

/// Trait for publishing events to the bus.
///
/// This is the seam components use when they only emit and never subscribe.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver an event; async handlers are not awaited.
    ///
    /// Returns the number of subscribers notified.
    fn emit(&self, name: &str, payload: Value) -> usize;

    /// Deliver an event and join every async handler.
    async fn emit_and_wait(&self, name: &str, payload: Value) -> Vec<Option<Value>>;

    /// Get the total number of events emitted.
    fn events_emitted(&self) -> u64;
}

/// Outcome of one handler during `emit_and_collect`.
///
/// `Ok(None)` for a synchronous handler that completed, `Ok(Some(v))` for an
/// async handler's value, `Err` for a failure or panic.
pub type HandlerOutcome = Result<Option<Value>, HandlerError>;

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStats {
    pub events_emitted: u64,
    pub events_processed: u64,
    pub subscribers_notified: u64,
    pub active_subscriptions: usize,
    pub event_patterns: usize,
}

#[derive(Default)]
struct Registry {
    by_pattern: HashMap<String, Vec<Arc<Subscription>>>,
    wildcard_patterns: HashSet<String>,
    index: HashMap<SubscriptionId, String>,
}

impl Registry {
    fn resolve(&self, name: &str) -> Vec<Arc<Subscription>> {
        let mut matched: Vec<Arc<Subscription>> =
            self.by_pattern.get(name).cloned().unwrap_or_default();

        for pattern in &self.wildcard_patterns {
            if pattern != name && wildcard_match(pattern, name) {
                if let Some(subs) = self.by_pattern.get(pattern) {
                    matched.extend(subs.iter().cloned());
                }
            }
        }

        matched.sort_by_key(|s| s.seq);
        matched
    }
}

/// In-process event bus.
pub struct InMemoryEventBus {
    registry: RwLock<Registry>,
    next_seq: AtomicU64,
    supervisor: TaskSupervisor,

    events_emitted: AtomicU64,
    events_processed: AtomicU64,
    subscribers_notified: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_seq: AtomicU64::new(0),
            supervisor: TaskSupervisor::new("event-bus"),
            events_emitted: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            subscribers_notified: AtomicU64::new(0),
        }
    }

    /// Register a handler for an event name or wildcard pattern.
    ///
    /// Always returns a fresh id, even for a duplicate pattern and handler.
    pub fn subscribe(&self, pattern: &str, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId::new();
        let subscription = Arc::new(Subscription {
            id,
            pattern: pattern.to_string(),
            handler,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });

        let mut registry = self.registry.write();
        registry
            .by_pattern
            .entry(pattern.to_string())
            .or_default()
            .push(subscription);
        if is_wildcard(pattern) {
            registry.wildcard_patterns.insert(pattern.to_string());
        }
        registry.index.insert(id, pattern.to_string());

        debug!(pattern, subscription = %id, "Subscription registered");
        id
    }

    /// Shorthand for a synchronous handler.
    pub fn on<F>(&self, pattern: &str, f: F) -> SubscriptionId
    where
        F: Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe(pattern, Handler::sync(f))
    }

    /// Shorthand for an asynchronous handler.
    pub fn on_async<F, Fut>(&self, pattern: &str, f: F) -> SubscriptionId
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.subscribe(pattern, Handler::from_async(f))
    }

    /// Remove one subscription. Unknown ids return false and change nothing.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut registry = self.registry.write();
        let Some(pattern) = registry.index.remove(id) else {
            return false;
        };

        let now_empty = match registry.by_pattern.get_mut(&pattern) {
            Some(subs) => {
                subs.retain(|s| s.id != *id);
                subs.is_empty()
            }
            None => false,
        };
        if now_empty {
            registry.by_pattern.remove(&pattern);
            registry.wildcard_patterns.remove(&pattern);
        }

        debug!(pattern = %pattern, subscription = %id, "Subscription removed");
        true
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        let mut registry = self.registry.write();
        *registry = Registry::default();
    }

    /// Total subscriptions, or those registered under exactly `pattern`.
    #[must_use]
    pub fn subscriber_count(&self, pattern: Option<&str>) -> usize {
        let registry = self.registry.read();
        match pattern {
            Some(p) => registry.by_pattern.get(p).map_or(0, Vec::len),
            None => registry.index.len(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        let registry = self.registry.read();
        BusStats {
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            subscribers_notified: self.subscribers_notified.load(Ordering::Relaxed),
            active_subscriptions: registry.index.len(),
            event_patterns: registry.wildcard_patterns.len(),
        }
    }

    /// Supervisor owning fire-and-forget handler tasks.
    #[must_use]
    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    /// Abort outstanding fire-and-forget handlers.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    /// Resolve, run sync handlers inline and join async handlers.
    ///
    /// Results follow registration order. The async handlers are polled on
    /// the caller's task, so dropping the returned future cancels them.
    pub async fn emit_and_collect(&self, name: &str, payload: Value) -> Vec<HandlerOutcome> {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        let subscriptions = self.registry.read().resolve(name);

        let mut outcomes: Vec<Option<HandlerOutcome>> = Vec::with_capacity(subscriptions.len());
        let mut pending = Vec::new();
        let mut notified = 0u64;

        for sub in &subscriptions {
            match &sub.handler {
                Handler::Sync(f) => {
                    let outcome = run_sync(name, &sub.pattern, f.as_ref(), &payload).map(|()| None);
                    if outcome.is_ok() {
                        notified += 1;
                    }
                    outcomes.push(Some(outcome));
                }
                Handler::Async(f) => {
                    let fut = AssertUnwindSafe(f(name.to_string(), payload.clone())).catch_unwind();
                    pending.push((outcomes.len(), fut));
                    outcomes.push(None);
                    notified += 1;
                }
            }
        }
        self.subscribers_notified
            .fetch_add(notified, Ordering::Relaxed);

        let (slots, futures): (Vec<usize>, Vec<_>) = pending.into_iter().unzip();
        let joined = join_all(futures).await;
        for (slot, result) in slots.into_iter().zip(joined) {
            let outcome = match result {
                Ok(Ok(value)) => Ok(Some(value)),
                Ok(Err(e)) => {
                    error!(event = name, error = %e, "Async subscriber failed");
                    Err(e)
                }
                Err(_) => {
                    error!(event = name, "Async subscriber panicked");
                    Err(HandlerError::new("handler panicked"))
                }
            };
            outcomes[slot] = Some(outcome);
        }

        self.events_processed.fetch_add(1, Ordering::Relaxed);
        debug!(event = name, subscribers = subscriptions.len(), "Event delivered and joined");

        outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| Err(HandlerError::new("handler not polled"))))
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn run_sync(
    name: &str,
    pattern: &str,
    f: &(dyn Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync),
    payload: &Value,
) -> Result<(), HandlerError> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| f(name, payload))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(event = name, pattern, error = %e, "Subscriber failed");
            Err(e)
        }
        Err(_) => {
            error!(event = name, pattern, "Subscriber panicked");
            Err(HandlerError::new("handler panicked"))
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    fn emit(&self, name: &str, payload: Value) -> usize {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        let subscriptions = self.registry.read().resolve(name);
        let mut notified = 0usize;

        for sub in &subscriptions {
            match &sub.handler {
                Handler::Sync(f) => {
                    if run_sync(name, &sub.pattern, f.as_ref(), &payload).is_ok() {
                        notified += 1;
                    }
                }
                Handler::Async(f) => {
                    let fut = f(name.to_string(), payload.clone());
                    let event = name.to_string();
                    let spawned = self.supervisor.spawn(async move {
                        if let Err(e) = fut.await {
                            error!(event = %event, error = %e, "Async subscriber failed");
                        }
                    });
                    if spawned {
                        notified += 1;
                    } else {
                        warn!(event = name, pattern = %sub.pattern, "Async subscriber skipped");
                    }
                }
            }
        }

        self.subscribers_notified
            .fetch_add(notified as u64, Ordering::Relaxed);
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        debug!(event = name, notified, "Event emitted");
        notified
    }

    async fn emit_and_wait(&self, name: &str, payload: Value) -> Vec<Option<Value>> {
        self.emit_and_collect(name, payload)
            .await
            .into_iter()
            .map(|outcome| outcome.ok().flatten())
            .collect()
    }

    fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }
}
