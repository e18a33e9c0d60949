//! # Shared Bus - Event Bus for Inter-Module Communication
//!
//! Modules never hold references to each other. Calls, telemetry, circuit
//! transitions and alerts all travel as named events with JSON payloads.
//!
//! ## Delivery Model
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Module A   │                    │   Module B   │
//! │              │      emit()        │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐           │
//!                  │  Event Bus   │           │
//!                  │              │ ──────────┘
//!                  └──────────────┘  subscribe(pattern)
//! ```
//!
//! - **Sync handlers** run inline, in registration order, before `emit` returns.
//! - **Async handlers** are fire-and-forget on `emit` (owned by a
//!   [`TaskSupervisor`]) and joined on `emit_and_wait`.
//! - A failing handler is logged and never stops delivery to the others.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;
pub mod supervisor;

// Re-export main types
pub use publisher::{BusStats, EventPublisher, HandlerOutcome, InMemoryEventBus};
pub use subscriber::{AsyncHandler, Handler, Subscription, SubscriptionId, SyncHandler};
pub use supervisor::TaskSupervisor;

/// Event names shared between the mediation components.
pub mod topics {
    pub const CIRCUIT_STATE_CHANGE: &str = "circuit:state_change";
    pub const CIRCUIT_LATENCY: &str = "metrics:circuit_latency";
    pub const CIRCUIT_FALLBACK: &str = "module:circuit_fallback";
    pub const INTERACTION_ERROR: &str = "module:interaction_error";
    pub const TELEMETRY_INTERACTION: &str = "telemetry:interaction";
    pub const TELEMETRY_LATENCY: &str = "telemetry:latency";
    pub const ANOMALY_DETECTED: &str = "telemetry:anomaly_detected";
    pub const SYSTEM_ALERT: &str = "system:alert";
    pub const SYSTEM_STATE_CHANGED: &str = "system:state_changed";
    pub const SYSTEM_METRICS: &str = "system:metrics";
    pub const SYSTEM_CPU_USAGE: &str = "system:cpu_usage";
    pub const SYSTEM_MEMORY_USAGE: &str = "system:memory_usage";
    pub const METRICS_ANY: &str = "metrics:*";

    /// Announcement emitted before a mediated call is dispatched.
    #[must_use]
    pub fn module_call(target: &str) -> String {
        format!("module:call:{target}")
    }

    /// Event a target module answers to handle a mediated call.
    #[must_use]
    pub fn module_handle(target: &str) -> String {
        format!("module:handle:{target}")
    }
}
