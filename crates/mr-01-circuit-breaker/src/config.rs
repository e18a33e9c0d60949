//! Circuit thresholds.

use std::time::Duration;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit
    pub max_failures: u32,
    /// Time after the last failure before an open circuit admits a trial call
    pub reset_timeout: Duration,
    /// Calls admitted while half-open, after the one that left OPEN
    pub half_open_max_calls: u32,
    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
            success_threshold: 2,
        }
    }
}

impl CircuitConfig {
    /// Apply the fields set in `overrides`.
    pub fn apply(&mut self, overrides: &CircuitOverrides) {
        if let Some(v) = overrides.max_failures {
            self.max_failures = v;
        }
        if let Some(v) = overrides.reset_timeout {
            self.reset_timeout = v;
        }
        if let Some(v) = overrides.half_open_max_calls {
            self.half_open_max_calls = v;
        }
        if let Some(v) = overrides.success_threshold {
            self.success_threshold = v;
        }
    }

    #[must_use]
    pub fn with(mut self, overrides: &CircuitOverrides) -> Self {
        self.apply(overrides);
        self
    }
}

/// Partial configuration; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircuitOverrides {
    pub max_failures: Option<u32>,
    pub reset_timeout: Option<Duration>,
    pub half_open_max_calls: Option<u32>,
    pub success_threshold: Option<u32>,
}
