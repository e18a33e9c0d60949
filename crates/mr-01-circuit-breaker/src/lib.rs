//! # Circuit Breaker
//!
//! One circuit per directed edge (`source:target`). A circuit stops calls to
//! a failing target and tries the target again after a reset timeout.
//!
//! ## State Machine
//!
//! ```text
//!              failure_count >= max_failures
//!   ┌────────┐ ─────────────────────────────► ┌────────┐
//!   │ CLOSED │                                │  OPEN  │ ◄──┐
//!   └────────┘ ◄──┐                           └────────┘    │
//!                 │                               │         │ any failure
//!                 │ success_count >=              │ reset   │ reaching
//!                 │ success_threshold             │ timeout │ max_failures
//!                 │                               ▼         │
//!                 │                          ┌───────────┐  │
//!                 └───────────────────────── │ HALF_OPEN │ ─┘
//!                                            └───────────┘
//! ```
//!
//! - While OPEN, calls fail fast with `CircuitOpen` (or take the fallback).
//! - While HALF_OPEN, the call that leaves OPEN plus at most `half_open_max_calls`
//!   further calls are admitted.
//! - Every mutation is persisted under `circuit.<id>` in the shared store and
//!   restored by [`CircuitBreaker::new`].
//!
//! ## Events
//!
//! | Event                     | When                      |
//! |---------------------------|---------------------------|
//! | `circuit:state_change`    | after every transition    |
//! | `metrics:circuit_latency` | after every successful call |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod events;
pub mod service;

pub use config::{CircuitConfig, CircuitOverrides};
pub use domain::{Admission, Circuit, CircuitRecord, CircuitState, Transition};
pub use events::{LatencyEvent, StateChangeEvent};
pub use service::{BreakerMetrics, CircuitBreaker, CircuitMetrics, Execution, SAMPLE_TTL};
