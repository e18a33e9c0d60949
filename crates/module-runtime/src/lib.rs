//! # Module Runtime Library
//!
//! Wiring for the mediation core. The main entry point is the `main.rs`
//! binary; the library exposes the pieces for integration tests.
//!
//! ## Architectural Patterns
//!
//! - **Mediator**: modules never reference each other; every call passes
//!   through the interaction manager
//! - **Event-Driven**: components report through the event bus only
//! - **Hexagonal Architecture**: the store and the bus are ports the
//!   components are handed at construction

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bridge;
pub mod config;
pub mod runtime;

pub use bridge::MetricsBridge;
pub use config::{ConfigError, ConfigResult, RuntimeConfig};
pub use runtime::ModuleRuntime;
