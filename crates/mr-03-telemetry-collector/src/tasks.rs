//! Periodic collector loops.
//!
//! Each loop selects between its timer and the shutdown signal, so a stop
//! request is honored at the next await point. A panic inside one tick is
//! caught and logged; the loop carries on with the next tick.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use shared_types::unix_now;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error};

use crate::service::CollectorCore;

fn guarded<R>(task: &'static str, work: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => Some(result),
        Err(_) => {
            error!(task, "Telemetry task panicked; continuing");
            None
        }
    }
}

/// Aggregate due windows every tick.
pub(crate) async fn aggregation_loop(core: Arc<CollectorCore>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(core.config().tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                guarded("aggregation", || core.aggregate_due(unix_now()));
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Aggregation loop stopped");
}

/// Score recent samples after an initial warm-up delay.
pub(crate) async fn anomaly_loop(core: Arc<CollectorCore>, mut shutdown: watch::Receiver<bool>) {
    let anomaly = core.config().anomaly.clone();
    tokio::select! {
        () = sleep(anomaly.initial_delay) => {}
        _ = shutdown.changed() => return,
    }

    let mut ticker = interval(anomaly.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                guarded("anomaly-detection", || core.detect_anomalies(unix_now()));
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Anomaly loop stopped");
}

/// Bound buffers and expire alerts, once at start and then per interval.
pub(crate) async fn maintenance_loop(core: Arc<CollectorCore>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(core.config().maintenance_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                guarded("maintenance", || core.maintain(unix_now()));
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Maintenance loop stopped");
}
