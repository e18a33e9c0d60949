//! # Runtime Configuration
//!
//! Unified configuration for every component. Defaults come from each
//! component's own config; `from_env` overrides them from `MR_*` variables.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `MR_LOG_LEVEL` | `telemetry.log_level` |
//! | `MR_JSON_LOGS` | `telemetry.json_logs` |
//! | `MR_DEFAULT_TIMEOUT_SECS` | `interaction.default_timeout` |
//! | `MR_CIRCUIT_MAX_FAILURES` | `circuit.max_failures` |
//! | `MR_CIRCUIT_RESET_TIMEOUT_SECS` | `circuit.reset_timeout` |
//! | `MR_STORE_SWEEP_SECS` | `store.sweep_interval` (0 disables) |
//! | `MR_TELEMETRY_ENABLED` | `telemetry_enabled` |
//!
//! Missing or unparsable values keep the default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use mr_01_circuit_breaker::CircuitConfig;
use mr_02_interaction_manager::InteractionConfig;
use mr_03_telemetry_collector::CollectorConfig;
use runtime_telemetry::{parse_flag, TelemetryConfig};
use shared_store::StoreConfig;
use thiserror::Error;
use tracing::warn;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Log output.
    pub telemetry: TelemetryConfig,
    /// Store sweeper.
    pub store: StoreConfig,
    /// Default thresholds for every circuit.
    pub circuit: CircuitConfig,
    /// Mediated call defaults.
    pub interaction: InteractionConfig,
    /// Collector windows, thresholds and caps.
    pub collector: CollectorConfig,
    /// Run the telemetry collector and the metrics bridge.
    pub telemetry_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            store: StoreConfig::default(),
            circuit: CircuitConfig::default(),
            interaction: InteractionConfig::default(),
            collector: CollectorConfig::default(),
            telemetry_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("circuit.max_failures must be at least 1")]
    ZeroMaxFailures,

    #[error("circuit.success_threshold must be at least 1")]
    ZeroSuccessThreshold,

    #[error("circuit.half_open_max_calls must be at least 1")]
    ZeroHalfOpenCalls,

    #[error("{0} must be longer than zero")]
    ZeroDuration(&'static str),

    #[error("aggregation window `{0}` has a zero interval")]
    ZeroWindow(String),

    #[error("collector.max_buffer must be at least 1")]
    ZeroBuffer,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    let value = raw.trim().parse().ok();
    if value.is_none() {
        warn!(variable = name, value = %raw, "Ignoring unparsable setting");
    }
    value
}

impl RuntimeConfig {
    /// Defaults overridden from `MR_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            telemetry: TelemetryConfig::from_env(),
            ..Self::default()
        };

        if let Some(secs) = parsed::<u64>("MR_DEFAULT_TIMEOUT_SECS") {
            config.interaction.default_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parsed::<u32>("MR_CIRCUIT_MAX_FAILURES") {
            config.circuit.max_failures = n;
        }
        if let Some(secs) = parsed::<u64>("MR_CIRCUIT_RESET_TIMEOUT_SECS") {
            config.circuit.reset_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>("MR_STORE_SWEEP_SECS") {
            config.store.sweep_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Ok(v) = env::var("MR_TELEMETRY_ENABLED") {
            config.telemetry_enabled = parse_flag(&v);
        }
        config.interaction.telemetry_enabled = config.telemetry_enabled;
        config
    }

    /// Reject values that would make a component inert or spin.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.circuit.max_failures == 0 {
            return Err(ConfigError::ZeroMaxFailures);
        }
        if self.circuit.success_threshold == 0 {
            return Err(ConfigError::ZeroSuccessThreshold);
        }
        if self.circuit.half_open_max_calls == 0 {
            return Err(ConfigError::ZeroHalfOpenCalls);
        }
        if self.circuit.reset_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("circuit.reset_timeout"));
        }
        if self.interaction.default_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("interaction.default_timeout"));
        }
        if self.collector.tick.is_zero() {
            return Err(ConfigError::ZeroDuration("collector.tick"));
        }
        if self.collector.anomaly.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("collector.anomaly.interval"));
        }
        if self.collector.maintenance_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("collector.maintenance_interval"));
        }
        if let Some(window) = self.collector.windows.iter().find(|w| w.interval.is_zero()) {
            return Err(ConfigError::ZeroWindow(window.name.clone()));
        }
        if self.collector.max_buffer == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        Ok(())
    }
}
