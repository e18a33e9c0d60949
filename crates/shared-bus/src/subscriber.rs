//! # Event Subscriber
//!
//! Defines the subscription side of the event bus: handler shapes and the
//! opaque subscription id returned by `subscribe`.

use futures::future::BoxFuture;
use serde_json::Value;
use shared_types::HandlerError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Inline handler. Receives the event name and a borrowed payload.
pub type SyncHandler = Arc<dyn Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync>;

/// Asynchronous handler. Its result is collected by `emit_and_wait`.
pub type AsyncHandler =
    Arc<dyn Fn(String, Value) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// A subscriber callback.
#[derive(Clone)]
pub enum Handler {
    /// Runs to completion before the next handler.
    Sync(SyncHandler),
    /// Fire-and-forget on `emit`, joined on `emit_and_wait`.
    Async(AsyncHandler),
}

impl Handler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::Async(Arc::new(
            move |name: String, payload: Value| -> BoxFuture<'static, Result<Value, HandlerError>> {
                Box::pin(f(name, payload))
            },
        ))
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "Handler::Sync"),
            Self::Async(_) => write!(f, "Handler::Async"),
        }
    }
}

/// Unique token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub pattern: String,
    pub handler: Handler,
    /// Registration order across the whole bus.
    pub(crate) seq: u64,
}

impl Subscription {
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.handler.is_async()
    }
}
