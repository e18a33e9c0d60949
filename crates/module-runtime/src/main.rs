//! # Module Runtime
//!
//! Entry point of the mediation core.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `MR_*` environment variables
//! 2. Install the log subscriber and register Prometheus metrics
//! 3. Build and validate the runtime
//! 4. Start the collector and the metrics bridge
//! 5. Register the demonstration edge `console -> echo`
//! 6. Run until Ctrl-C, then shut down

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use shared_types::{HandlerError, PermissionLevel, SecurityContext};
use tracing::{info, warn};

use module_runtime::{ModuleRuntime, RuntimeConfig};
use runtime_telemetry::{encode_metrics, init_telemetry};

/// Register a target that echoes its payload and make one call to it.
async fn demonstrate(runtime: &ModuleRuntime) -> Result<()> {
    let manager = runtime.manager();
    manager.register_edge("console", "echo", PermissionLevel::Read, Some(Duration::from_secs(2)));
    manager.expose("echo", |payload| async move {
        Ok::<_, HandlerError>(json!({ "echo": payload }))
    });

    let context = SecurityContext::new(PermissionLevel::Normal);
    let reply = manager
        .call("console", "echo", json!({ "hello": "world" }), Some(&context))
        .await
        .context("demonstration call failed")?;
    info!(%reply, "Demonstration call completed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;

    let runtime = ModuleRuntime::new(config).context("Invalid runtime configuration")?;
    if !runtime.start() {
        anyhow::bail!("Module runtime failed to start");
    }

    if let Err(e) = demonstrate(&runtime).await {
        warn!(error = %e, "Demonstration skipped");
    }

    info!("Runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    match encode_metrics() {
        Ok(text) => info!(bytes = text.len(), "Final metrics snapshot encoded"),
        Err(e) => warn!(error = %e, "Could not encode metrics"),
    }
    Ok(())
}
