//! # Circuit Entity
//!
//! One circuit per ordered edge `"<source>:<target>"`. All mutation goes
//! through the methods below, which keep two invariants:
//!
//! - exactly one state at all times
//! - `failure_count > 0` implies `success_count == 0` and vice versa
//!
//! Window counters are reset on entering a state:
//!
//! | Entering  | Reset                                   |
//! |-----------|-----------------------------------------|
//! | CLOSED    | failure_count, success_count            |
//! | OPEN      | success_count                           |
//! | HALF_OPEN | success_count, half_open_calls          |
//!
//! `failure_count` survives OPEN → HALF_OPEN, so one failed half-open call reopens the
//! circuit through the same `failure_count >= max_failures` guard.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::state::{Admission, CircuitState, Transition};
use crate::config::CircuitConfig;

/// Failure-isolation state for one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    pub id: String,
    pub source: String,
    pub target: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub half_open_calls: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub open_count: u64,
    pub last_failure_time: Option<f64>,
    pub last_success_time: Option<f64>,
    pub last_state_change: f64,
    pub config: CircuitConfig,
}

impl Circuit {
    #[must_use]
    pub fn new(source: &str, target: &str, config: CircuitConfig, now: f64) -> Self {
        Self::with_id(&format!("{source}:{target}"), source, target, config, now)
    }

    /// Circuit for an id that was not built from its endpoints.
    #[must_use]
    pub fn for_id(id: &str, config: CircuitConfig, now: f64) -> Self {
        let (source, target) = Self::split_id(id);
        Self::with_id(id, source, target, config, now)
    }

    fn with_id(id: &str, source: &str, target: &str, config: CircuitConfig, now: f64) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_calls: 0,
            total_successes: 0,
            total_failures: 0,
            total_timeouts: 0,
            open_count: 0,
            last_failure_time: None,
            last_success_time: None,
            last_state_change: now,
            config,
        }
    }

    /// Split a circuit id into `(source, target)`.
    ///
    /// Ids without a `:` belong to the `default` source.
    #[must_use]
    pub fn split_id(id: &str) -> (&str, &str) {
        id.split_once(':').unwrap_or(("default", id))
    }

    /// Decide whether a call may proceed.
    ///
    /// An OPEN circuit whose reset timeout has elapsed since the last failure
    /// moves to HALF_OPEN first; that call is admitted without taking a
    /// half-open slot. Each later call in HALF_OPEN takes one slot, including
    /// calls that end up rejected.
    pub fn admit(&mut self, now: f64) -> (Admission, Option<Transition>) {
        let mut transition = None;
        let was_half_open = self.state == CircuitState::HalfOpen;

        if self.state == CircuitState::Open {
            let elapsed = self.last_failure_time.map_or(f64::INFINITY, |t| now - t);
            if elapsed > self.config.reset_timeout.as_secs_f64() {
                transition = self.change_state(CircuitState::HalfOpen, now);
            } else {
                return (Admission::Rejected, None);
            }
        }

        if was_half_open {
            self.half_open_calls += 1;
            if self.half_open_calls > self.config.half_open_max_calls {
                return (Admission::Rejected, transition);
            }
        }

        (Admission::Allowed, transition)
    }

    pub fn record_success(&mut self, now: f64) -> Option<Transition> {
        self.success_count += 1;
        self.total_successes += 1;
        self.failure_count = 0;
        self.last_success_time = Some(now);

        if self.state == CircuitState::HalfOpen && self.success_count >= self.config.success_threshold
        {
            return self.change_state(CircuitState::Closed, now);
        }
        None
    }

    /// Record a failed call. Timeouts also count toward `total_timeouts`.
    pub fn record_failure(&mut self, now: f64, timed_out: bool) -> Option<Transition> {
        if timed_out {
            self.total_timeouts += 1;
        }
        self.failure_count += 1;
        self.total_failures += 1;
        self.success_count = 0;
        self.last_failure_time = Some(now);

        let may_open = matches!(self.state, CircuitState::Closed | CircuitState::HalfOpen);
        if may_open && self.failure_count >= self.config.max_failures {
            self.open_count += 1;
            return self.change_state(CircuitState::Open, now);
        }
        None
    }

    /// Force the circuit back to CLOSED with empty window counters.
    pub fn reset(&mut self, now: f64) -> Option<Transition> {
        let transition = self.change_state(CircuitState::Closed, now);
        self.failure_count = 0;
        self.success_count = 0;
        self.half_open_calls = 0;
        transition
    }

    /// Calls that succeeded, over all finished calls; 1.0 before any call.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let finished = self.total_successes + self.total_failures;
        if finished == 0 {
            1.0
        } else {
            self.total_successes as f64 / finished as f64
        }
    }

    fn change_state(&mut self, to: CircuitState, now: f64) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }

        self.state = to;
        self.last_state_change = now;
        match to {
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = 0;
            }
            CircuitState::Open => {
                self.success_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count = 0;
                self.half_open_calls = 0;
            }
        }

        Some(Transition { from, to, at: now })
    }
}

/// Persisted form of a circuit, stored under `circuit.<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitRecord {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub half_open_calls: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub open_count: u64,
    pub max_failures: u32,
    pub reset_timeout_seconds: f64,
    pub half_open_max_calls: u32,
    pub success_threshold: u32,
    pub last_failure_time: Option<f64>,
    pub last_success_time: Option<f64>,
    pub last_state_change: f64,
    pub source: String,
    pub target: String,
}

impl From<&Circuit> for CircuitRecord {
    fn from(c: &Circuit) -> Self {
        Self {
            state: c.state,
            failure_count: c.failure_count,
            success_count: c.success_count,
            half_open_calls: c.half_open_calls,
            total_successes: c.total_successes,
            total_failures: c.total_failures,
            total_timeouts: c.total_timeouts,
            open_count: c.open_count,
            max_failures: c.config.max_failures,
            reset_timeout_seconds: c.config.reset_timeout.as_secs_f64(),
            half_open_max_calls: c.config.half_open_max_calls,
            success_threshold: c.config.success_threshold,
            last_failure_time: c.last_failure_time,
            last_success_time: c.last_success_time,
            last_state_change: c.last_state_change,
            source: c.source.clone(),
            target: c.target.clone(),
        }
    }
}

impl Circuit {
    /// Rebuild a circuit persisted under `circuit.<id>`.
    #[must_use]
    pub fn from_record(id: &str, r: CircuitRecord) -> Self {
        Self {
            id: id.to_string(),
            source: r.source,
            target: r.target,
            state: r.state,
            failure_count: r.failure_count,
            success_count: r.success_count,
            half_open_calls: r.half_open_calls,
            total_successes: r.total_successes,
            total_failures: r.total_failures,
            total_timeouts: r.total_timeouts,
            open_count: r.open_count,
            last_failure_time: r.last_failure_time,
            last_success_time: r.last_success_time,
            last_state_change: r.last_state_change,
            config: CircuitConfig {
                max_failures: r.max_failures,
                reset_timeout: Duration::try_from_secs_f64(r.reset_timeout_seconds)
                    .unwrap_or_else(|_| CircuitConfig::default().reset_timeout),
                half_open_max_calls: r.half_open_max_calls,
                success_threshold: r.success_threshold,
            },
        }
    }
}
