//! # Runtime Telemetry
//!
//! Log subscriber setup and the Prometheus registry for the module runtime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use runtime_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | unset | Full filter directive; overrides `MR_LOG_LEVEL` |
//! | `MR_LOG_LEVEL` | `info` | Log level filter |
//! | `MR_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `MR_CONSOLE_OUTPUT` | `true` | Write logs to the console |
//! | `MR_SERVICE_NAME` | `module-runtime` | Name in the startup log line |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::{env_filter, init_logging};
pub use metrics::{
    encode_metrics, register_metrics, ALERTS, BUS_EVENTS, CALLS, CALL_DURATION,
    CIRCUIT_TRANSITIONS, MALFORMED_EVENTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Log subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Register metrics, then install the log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    register_metrics()?;
    init_logging(config)
}
