use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Failing edge - calls are rejected immediately
    Open,
    /// Probing recovery - a limited number of calls pass through
    HalfOpen,
}

impl CircuitState {
    /// Persisted and emitted name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, reported once it has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: f64,
}

/// Result of asking a circuit to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_match_serde() {
        for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            let encoded = serde_json::to_value(state).unwrap();
            assert_eq!(encoded, serde_json::Value::String(state.as_str().to_string()));
        }
    }
}
