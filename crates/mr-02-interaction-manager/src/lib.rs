//! # Interaction Manager
//!
//! The mediator every cross-module call passes through. Modules never hold
//! references to each other: a caller names a target, the manager checks
//! the permission edge, applies the edge's circuit and deadline, and
//! dispatches over the event bus.
//!
//! ## Architecture
//!
//! - **Domain Layer:** permission edges, deadlines, traces, statistics
//! - **Ports Layer:** [`InteractionApi`], the driving port
//! - **Service Layer:** [`InteractionManager`], wiring the domain to the
//!   bus, the store and the circuit breaker
//!
//! ## Error Kinds
//!
//! | Kind | Trace code | Counter | Absorbed by fallback |
//! |------|------------|---------|----------------------|
//! | unregistered edge | `PERMISSION_ERROR` | `permission_errors` | never |
//! | level too low | `SECURITY_ERROR` | `security_errors` | never |
//! | deadline exceeded | `TIMEOUT_ERROR` | `timeouts` | yes |
//! | circuit open | `CIRCUIT_OPEN` | none | yes |
//! | handler failed | `EXECUTION_ERROR` | `errors` | yes |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::{InteractionConfig, DEFAULT_CALL_TIMEOUT};
pub use domain::{
    EdgeStats, InteractionTrace, PermissionRegistry, StatsScope, StatsSummary, TimeoutTable,
    TraceStatus,
};
pub use ports::InteractionApi;
pub use service::InteractionManager;
