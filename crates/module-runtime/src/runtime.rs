//! # Module Runtime
//!
//! Owns one instance of every component and their shared infrastructure.
//!
//! ## Initialization Order
//!
//! 1. Store (with its sweeper thread when configured)
//! 2. Event bus
//! 3. Circuit breaker (rehydrates persisted circuits)
//! 4. Interaction manager
//! 5. Telemetry collector, when telemetry is enabled
//!
//! ## Shutdown Sequence
//!
//! 1. Signal the shutdown channel
//! 2. Detach the metrics bridge
//! 3. Stop the collector and its loops
//! 4. Abort and drain async bus handlers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_store::{InMemoryStore, Store};
use tokio::sync::watch;
use tracing::{error, info};

use mr_01_circuit_breaker::CircuitBreaker;
use mr_02_interaction_manager::InteractionManager;
use mr_03_telemetry_collector::TelemetryCollector;

use crate::bridge::MetricsBridge;
use crate::config::{ConfigResult, RuntimeConfig};

/// The runtime wiring every component together.
pub struct ModuleRuntime {
    config: RuntimeConfig,
    store: Arc<InMemoryStore>,
    bus: Arc<InMemoryEventBus>,
    breaker: Arc<CircuitBreaker>,
    manager: Arc<InteractionManager>,
    collector: Option<Arc<TelemetryCollector>>,
    bridge: Mutex<Option<MetricsBridge>>,
    started: AtomicBool,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl ModuleRuntime {
    /// Validate `config` and build every component.
    pub fn new(config: RuntimeConfig) -> ConfigResult<Self> {
        config.validate()?;
        info!("Creating module runtime");

        let store = Arc::new(InMemoryStore::with_config(&config.store));
        let bus = Arc::new(InMemoryEventBus::new());
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&bus) as Arc<dyn EventPublisher>,
            config.circuit.clone(),
        ));
        let manager = Arc::new(InteractionManager::new(
            Arc::clone(&bus),
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&breaker),
            config.interaction.clone(),
        ));
        let collector = config.telemetry_enabled.then(|| {
            Arc::new(TelemetryCollector::new(
                Arc::clone(&bus),
                Arc::clone(&store) as Arc<dyn Store>,
                config.collector.clone(),
            ))
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            store,
            bus,
            breaker,
            manager,
            collector,
            bridge: Mutex::new(None),
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start the collector loops and attach the metrics bridge.
    ///
    /// A runtime starts at most once; it cannot be restarted after shutdown.
    pub fn start(&self) -> bool {
        if *self.shutdown_rx.borrow()
            || self
                .started
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return false;
        }

        if let Some(collector) = &self.collector {
            if !collector.start() {
                error!("Telemetry collector failed to start");
                self.started.store(false, Ordering::Release);
                return false;
            }
            *self.bridge.lock() = Some(MetricsBridge::attach(&self.bus));
        }

        info!(
            telemetry = self.config.telemetry_enabled,
            circuits = self.breaker.list_circuits().len(),
            "Module runtime started"
        );
        true
    }

    /// Stop everything started by [`ModuleRuntime::start`] and drain the bus.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let bridge = self.bridge.lock().take();
        if let Some(bridge) = bridge {
            bridge.detach(&self.bus);
        }
        if let Some(collector) = &self.collector {
            collector.stop().await;
        }
        self.bus.shutdown().await;

        info!("Shutdown complete");
    }

    /// Receiver that flips to `true` once shutdown begins.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<InteractionManager> {
        &self.manager
    }

    #[must_use]
    pub fn collector(&self) -> Option<&Arc<TelemetryCollector>> {
        self.collector.as_ref()
    }
}
