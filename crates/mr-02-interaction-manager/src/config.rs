//! Mediator configuration.

use std::time::Duration;

/// Deadline applied when neither the edge nor its source has one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Interaction manager configuration
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionConfig {
    /// Hard default deadline for a mediated call
    pub default_timeout: Duration,
    /// Emit `telemetry:interaction` and `telemetry:latency`
    pub telemetry_enabled: bool,
    /// Absorb circuit-open, timeout and execution failures with a null result
    pub fallback_enabled: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_CALL_TIMEOUT,
            telemetry_enabled: true,
            fallback_enabled: true,
        }
    }
}
