//! # Error Types
//!
//! Defines error types used across the mediation crates.

use crate::security::PermissionLevel;
use std::fmt;
use thiserror::Error;

/// Failure raised by an event-bus handler.
///
/// The bus catches these and logs them; they never stop delivery to the
/// remaining subscribers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why a permission check rejected a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No edge registered for the ordered pair.
    Unregistered,
    /// A security context was supplied with too low a level.
    InsufficientLevel {
        required: PermissionLevel,
        actual: PermissionLevel,
    },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "interaction not registered"),
            Self::InsufficientLevel { required, actual } => {
                write!(f, "security level {actual} below required {required}")
            }
        }
    }
}

/// Errors surfaced by a mediated call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// No registered edge, or security level below the edge's requirement.
    #[error("Permission denied for {edge}: {reason}")]
    PermissionDenied { edge: String, reason: DenialReason },

    /// The call exceeded its deadline and was cancelled.
    #[error("Call through {circuit_id} timed out after {timeout_ms}ms")]
    Timeout { circuit_id: String, timeout_ms: u64 },

    /// The edge is open, or the half-open call quota is exhausted.
    #[error("Circuit {circuit_id} is open")]
    CircuitOpen { circuit_id: String },

    /// The target handler itself failed.
    #[error("Execution failed on {circuit_id}: {message}")]
    Execution { circuit_id: String, message: String },
}

impl CallError {
    /// Classify this error for traces and counters.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied {
                reason: DenialReason::Unregistered,
                ..
            } => ErrorKind::Permission,
            Self::PermissionDenied { .. } => ErrorKind::Security,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Execution { .. } => ErrorKind::Execution,
        }
    }
}

/// Failure classification recorded in interaction traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Permission,
    Security,
    Timeout,
    CircuitOpen,
    Execution,
}

impl ErrorKind {
    /// Persisted `errorType` code.
    #[must_use]
    pub fn trace_code(self) -> &'static str {
        match self {
            Self::Permission => "PERMISSION_ERROR",
            Self::Security => "SECURITY_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::Execution => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trace_code())
    }
}

pub type CallResult<T> = Result<T, CallError>;
