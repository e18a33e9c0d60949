//! # Telemetry Collector Service
//!
//! [`CollectorCore`] owns every piece of mutable collector state behind one
//! mutex. Bus handlers and periodic loops call into it; alerts and events
//! are always published after the lock is released, because sync bus
//! handlers may run inside `emit`.
//!
//! [`TelemetryCollector`] is the public face: lifecycle plus queries.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::{topics, EventPublisher, InMemoryEventBus, SubscriptionId, TaskSupervisor};
use shared_store::Store;
use shared_types::{iso_now, key_stamp, matches_filter, unix_now, wildcard_match};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{AggregationWindow, CollectorConfig, Threshold, REALTIME_WINDOW};
use crate::domain::{
    Admission, Alert, AlertBook, AlertSeverity, Anomaly, AnomalyModel, HealthAssessment,
    HealthSignals, MetricBuffer, ModelStats, Statistics, TelemetryReport, WindowStatistics,
};
use crate::{handlers, tasks};

/// Anomalies younger than this count against health.
const RECENT_ANOMALY_SECS: f64 = 300.0;
/// Error rate above which a pair counts against health.
const HEALTH_ERROR_RATE: f64 = 0.1;
/// Buffered samples a metric needs to appear in a report's statistics.
const REPORT_MIN_SAMPLES: usize = 5;
const REPORT_ANOMALIES: usize = 10;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct CollectorState {
    buffers: BTreeMap<String, MetricBuffer>,
    last_values: BTreeMap<String, f64>,
    counters: BTreeMap<String, u64>,
    thresholds: BTreeMap<String, Threshold>,
    alerts: AlertBook,
    anomalies: VecDeque<Anomaly>,
    models: HashMap<String, AnomalyModel>,
    last_aggregation: HashMap<String, f64>,
}

/// Shared collector state and the operations over it.
pub(crate) struct CollectorCore {
    config: CollectorConfig,
    bus: Arc<InMemoryEventBus>,
    store: Arc<dyn Store>,
    state: Mutex<CollectorState>,
    key_seq: AtomicU64,
}

impl CollectorCore {
    fn new(bus: Arc<InMemoryEventBus>, store: Arc<dyn Store>, config: CollectorConfig) -> Self {
        let state = CollectorState {
            thresholds: config.thresholds.clone(),
            ..CollectorState::default()
        };
        Self {
            config,
            bus,
            store,
            state: Mutex::new(state),
            key_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub(crate) fn bus(&self) -> &InMemoryEventBus {
        &self.bus
    }

    pub(crate) fn persist(&self, key: &str, value: Value) {
        self.store.set(key, value);
    }

    // -------------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------------

    /// Buffer a sample. Non-finite values are rejected.
    pub(crate) fn record_metric(&self, name: &str, value: f64) -> bool {
        if !value.is_finite() {
            debug!(metric = name, "Ignoring non-finite sample");
            return false;
        }
        let mut state = self.state.lock();
        let cap = self.config.max_buffer;
        state
            .buffers
            .entry(name.to_string())
            .or_insert_with(|| MetricBuffer::new(cap))
            .push(value);
        state.last_values.insert(name.to_string(), value);
        true
    }

    /// Add `amount` to a counter and return its new value.
    pub(crate) fn increment_counter(&self, name: &str, amount: u64) -> u64 {
        let mut state = self.state.lock();
        let counter = state.counters.entry(name.to_string()).or_insert(0);
        *counter = counter.saturating_add(amount);
        *counter
    }

    pub(crate) fn counter(&self, name: &str) -> u64 {
        self.state.lock().counters.get(name).copied().unwrap_or(0)
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    /// Offer an alert under its own key; publish it when admitted.
    pub(crate) fn raise(&self, alert: Alert) -> bool {
        let key = alert.key();
        self.raise_keyed(key, alert)
    }

    /// Offer an alert under an explicit key; publish it when admitted.
    pub(crate) fn raise_keyed(&self, key: String, alert: Alert) -> bool {
        let admission = {
            let mut state = self.state.lock();
            state.alerts.offer_keyed(
                key,
                &alert,
                self.config.alert_dedup.as_secs_f64(),
                self.config.alert_escalation,
            )
        };
        match admission {
            Admission::Raised => {
                self.publish_alert(&alert);
                true
            }
            Admission::Suppressed => {
                debug!(key = %alert.key(), "Alert suppressed");
                false
            }
        }
    }

    /// Raise an alert only when `key` is not already active.
    pub(crate) fn raise_once(&self, key: String, alert: Alert) -> bool {
        {
            let mut state = self.state.lock();
            if state.alerts.contains(&key) {
                return false;
            }
            state.alerts.offer_keyed(
                key,
                &alert,
                self.config.alert_dedup.as_secs_f64(),
                self.config.alert_escalation,
            );
        }
        self.publish_alert(&alert);
        true
    }

    pub(crate) fn clear_alert(&self, key: &str) -> bool {
        self.state.lock().alerts.remove(key).is_some()
    }

    fn publish_alert(&self, alert: &Alert) {
        let key = format!("alerts.{}-{}", key_stamp(alert.timestamp), alert.key());
        let payload = serde_json::to_value(alert).unwrap_or(Value::Null);
        self.persist(&key, payload.clone());

        match alert.severity {
            AlertSeverity::Critical | AlertSeverity::Error => {
                error!(alert = %alert.alert_type, metric = %alert.metric, "{}", alert.message);
            }
            AlertSeverity::Warning => {
                warn!(alert = %alert.alert_type, metric = %alert.metric, "{}", alert.message);
            }
            AlertSeverity::Info => {
                info!(alert = %alert.alert_type, metric = %alert.metric, "{}", alert.message);
            }
        }
        self.bus.emit(topics::SYSTEM_ALERT, payload);
    }

    // -------------------------------------------------------------------------
    // Aggregation
    // -------------------------------------------------------------------------

    /// Aggregate every window whose interval has elapsed since its last run.
    pub(crate) fn aggregate_due(&self, now: f64) -> usize {
        let due: Vec<AggregationWindow> = {
            let mut state = self.state.lock();
            self.config
                .windows
                .iter()
                .filter(|w| {
                    let last = state.last_aggregation.entry(w.name.clone()).or_insert(now);
                    now - *last >= w.interval.as_secs_f64()
                })
                .cloned()
                .collect()
        };

        due.iter().map(|w| self.aggregate(w, now)).sum()
    }

    /// Aggregate one window by name. Unknown names aggregate nothing.
    pub(crate) fn aggregate_window(&self, name: &str, now: f64) -> usize {
        match self.config.window(name) {
            Some(window) => self.aggregate(&window.clone(), now),
            None => {
                warn!(window = name, "Unknown aggregation window");
                0
            }
        }
    }

    fn aggregate(&self, window: &AggregationWindow, now: f64) -> usize {
        let timestamp = iso_now();
        let interval = window.name.clone();
        let mut records = Vec::new();
        let mut raised = Vec::new();

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.last_aggregation.insert(window.name.clone(), now);

            for (metric, buffer) in &mut state.buffers {
                let Some(stats) = Statistics::compute(&buffer.values()) else {
                    continue;
                };
                if window.clears_buffer() {
                    buffer.clear();
                }
                check_thresholds(
                    &state.thresholds,
                    &mut state.alerts,
                    &self.config,
                    metric,
                    &stats,
                    now,
                    &mut raised,
                );
                records.push(WindowStatistics {
                    timestamp: timestamp.clone(),
                    interval: interval.clone(),
                    metric: metric.clone(),
                    stats,
                });
            }
        }

        for record in &records {
            let key = format!("metrics.{}.{}.{}", record.interval, record.metric, key_stamp(now));
            self.persist(&key, serde_json::to_value(record).unwrap_or(Value::Null));
        }
        for alert in &raised {
            self.publish_alert(alert);
        }
        debug!(window = %window.name, metrics = records.len(), "Window aggregated");
        records.len()
    }

    // -------------------------------------------------------------------------
    // Anomaly detection
    // -------------------------------------------------------------------------

    /// Fit or refresh a model per metric and score its most recent samples.
    pub(crate) fn detect_anomalies(&self, now: f64) -> usize {
        let cfg = &self.config.anomaly;
        let refresh = cfg.refresh_after.as_secs_f64();
        let mut found = Vec::new();
        let mut raised = Vec::new();

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            for (metric, buffer) in &state.buffers {
                if buffer.len() < cfg.min_samples {
                    continue;
                }
                let values = buffer.values();
                let model = match state.models.get(metric) {
                    None => AnomalyModel::fit(&values, now),
                    Some(m) if now - m.last_update > refresh => Some(m.refit(&values, now)),
                    Some(m) => Some(*m),
                };
                let Some(model) = model else { continue };
                state.models.insert(metric.clone(), model);

                for value in buffer.recent(cfg.recent_window) {
                    let score = model.score(value);
                    if score <= cfg.z_limit {
                        continue;
                    }
                    let severity = if score > model.threshold * 2.0 {
                        AlertSeverity::Error
                    } else {
                        AlertSeverity::Warning
                    };
                    let alert = Alert::for_metric(metric, value, model.threshold, severity, now)
                        .with_details(json!({ "anomalyScore": score }));
                    if state.alerts.offer(
                        &alert,
                        self.config.alert_dedup.as_secs_f64(),
                        self.config.alert_escalation,
                    ) == Admission::Raised
                    {
                        raised.push(alert);
                    }
                    found.push(Anomaly {
                        metric: metric.clone(),
                        value,
                        score,
                        timestamp: now,
                        threshold: model.threshold,
                        model_stats: ModelStats {
                            mean: model.mean,
                            stddev: model.stddev,
                        },
                    });
                }
            }

            for anomaly in &found {
                state.anomalies.push_back(anomaly.clone());
                while state.anomalies.len() > self.config.max_anomalies {
                    state.anomalies.pop_front();
                }
            }
        }

        for anomaly in &found {
            let seq = self.key_seq.fetch_add(1, Ordering::Relaxed);
            let key = format!("anomaly.{}.{}-{seq}", anomaly.metric, key_stamp(now));
            let payload = serde_json::to_value(anomaly).unwrap_or(Value::Null);
            self.persist(&key, payload.clone());
            warn!(
                metric = %anomaly.metric,
                value = anomaly.value,
                score = anomaly.score,
                "Anomaly detected"
            );
            self.bus.emit(topics::ANOMALY_DETECTED, payload);
        }
        for alert in &raised {
            self.publish_alert(alert);
        }
        found.len()
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Bound buffers and anomaly history; expire stale alerts.
    pub(crate) fn maintain(&self, now: f64) -> usize {
        let mut state = self.state.lock();
        for buffer in state.buffers.values_mut() {
            buffer.truncate_oldest(self.config.max_buffer);
        }
        while state.anomalies.len() > self.config.max_anomalies {
            state.anomalies.pop_front();
        }
        let expired = state.alerts.expire(now, self.config.alert_ttl.as_secs_f64());
        debug!(expired, "Telemetry maintenance complete");
        expired
    }

    // -------------------------------------------------------------------------
    // Health and reporting
    // -------------------------------------------------------------------------

    pub(crate) fn assess_health(&self, now: f64) -> HealthAssessment {
        let signals = {
            let state = self.state.lock();
            HealthSignals {
                critical_alerts: state.alerts.count(AlertSeverity::Critical),
                error_alerts: state.alerts.count(AlertSeverity::Error),
                warning_alerts: state.alerts.count(AlertSeverity::Warning),
                open_circuits: state
                    .alerts
                    .keys()
                    .filter(|k| k.starts_with(handlers::CIRCUIT_OPEN_KEY))
                    .count(),
                cpu_percent: state.last_values.get("cpu.percent").copied().unwrap_or(0.0),
                memory_percent: state.last_values.get("memory.percent").copied().unwrap_or(0.0),
                high_error_rates: state
                    .last_values
                    .iter()
                    .filter(|(k, v)| k.starts_with("error.rate") && **v > HEALTH_ERROR_RATE)
                    .count(),
                recent_anomalies: state
                    .anomalies
                    .iter()
                    .filter(|a| now - a.timestamp < RECENT_ANOMALY_SECS)
                    .count(),
            }
        };
        HealthAssessment::assess(&signals)
    }

    pub(crate) fn report(&self, now: f64) -> TelemetryReport {
        let system_health = self.assess_health(now);
        let report = {
            let state = self.state.lock();
            TelemetryReport {
                timestamp: iso_now(),
                metrics: state.last_values.clone(),
                counters: state.counters.clone(),
                stats: state
                    .buffers
                    .iter()
                    .filter(|(_, b)| b.len() > REPORT_MIN_SAMPLES)
                    .filter_map(|(m, b)| Statistics::compute(&b.values()).map(|s| (m.clone(), s)))
                    .collect(),
                active_alerts: state.alerts.alerts().cloned().collect(),
                recent_anomalies: state.anomalies.iter().rev().take(REPORT_ANOMALIES).cloned().collect(),
                system_health,
            }
        };

        let key = format!("reports.system.{}", key_stamp(now));
        self.persist(&key, serde_json::to_value(&report).unwrap_or(Value::Null));
        report
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    fn metrics(&self, pattern: Option<&str>) -> BTreeMap<String, f64> {
        self.state
            .lock()
            .last_values
            .iter()
            .filter(|(k, _)| matches_filter(pattern, k))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn counters(&self, pattern: Option<&str>) -> BTreeMap<String, u64> {
        self.state
            .lock()
            .counters
            .iter()
            .filter(|(k, _)| matches_filter(pattern, k))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn statistics(&self, metric: &str, window: &str) -> Option<WindowStatistics> {
        if window == REALTIME_WINDOW {
            let values = self.state.lock().buffers.get(metric)?.values();
            return Statistics::compute(&values).map(|stats| WindowStatistics {
                timestamp: iso_now(),
                interval: window.to_string(),
                metric: metric.to_string(),
                stats,
            });
        }

        let prefix = format!("metrics.{window}.{metric}.");
        let latest = self
            .store
            .keys(Some(&format!("{prefix}*")))
            .into_iter()
            .filter(|k| {
                k.strip_prefix(&prefix)
                    .is_some_and(|stamp| !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()))
            })
            .max()?;
        let record = self.store.get(&latest)?;
        serde_json::from_value(record).ok()
    }
}

/// Value compared against a pattern's thresholds.
fn representative(pattern: &str, stats: &Statistics) -> f64 {
    if pattern.ends_with(".max") {
        stats.max
    } else if pattern.starts_with("latency.") {
        stats.p95.unwrap_or(stats.mean)
    } else {
        stats.mean
    }
}

fn check_thresholds(
    thresholds: &BTreeMap<String, Threshold>,
    alerts: &mut AlertBook,
    config: &CollectorConfig,
    metric: &str,
    stats: &Statistics,
    now: f64,
    raised: &mut Vec<Alert>,
) {
    for (pattern, threshold) in thresholds {
        if !wildcard_match(pattern, metric) {
            continue;
        }
        let value = representative(pattern, stats);
        let crossed = match (threshold.critical, threshold.warning) {
            (Some(c), _) if value >= c => Some((c, AlertSeverity::Critical)),
            (_, Some(w)) if value >= w => Some((w, AlertSeverity::Warning)),
            _ => None,
        };
        let Some((level, severity)) = crossed else { continue };

        let alert = Alert::for_metric(metric, value, level, severity, now)
            .with_details(serde_json::to_value(stats).unwrap_or(Value::Null));
        if alerts.offer(&alert, config.alert_dedup.as_secs_f64(), config.alert_escalation)
            == Admission::Raised
        {
            raised.push(alert);
        }
    }
}

// =============================================================================
// PUBLIC SERVICE
// =============================================================================

#[derive(Default)]
struct Lifecycle {
    running: bool,
    shutdown: Option<watch::Sender<bool>>,
    subscriptions: Vec<SubscriptionId>,
}

/// Subscribes to system and interaction events, aggregates metrics over
/// windows, raises threshold and anomaly alerts, and scores system health.
pub struct TelemetryCollector {
    core: Arc<CollectorCore>,
    lifecycle: Mutex<Lifecycle>,
    supervisor: TaskSupervisor,
}

impl TelemetryCollector {
    #[must_use]
    pub fn new(bus: Arc<InMemoryEventBus>, store: Arc<dyn Store>, config: CollectorConfig) -> Self {
        Self {
            core: Arc::new(CollectorCore::new(bus, store, config)),
            lifecycle: Mutex::new(Lifecycle::default()),
            supervisor: TaskSupervisor::new("telemetry-collector"),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CollectorConfig {
        self.core.config()
    }

    /// Subscribe to the bus and start the aggregation, anomaly and
    /// maintenance loops. Returns false when already running or when no
    /// tokio runtime is available.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.running {
            warn!("Telemetry collector already running");
            return false;
        }

        let (tx, rx) = watch::channel(false);
        let core = &self.core;
        let spawned = self.supervisor.spawn(tasks::aggregation_loop(Arc::clone(core), rx.clone()))
            && self.supervisor.spawn(tasks::anomaly_loop(Arc::clone(core), rx.clone()))
            && self.supervisor.spawn(tasks::maintenance_loop(Arc::clone(core), rx));
        if !spawned {
            let _ = tx.send(true);
            error!("Telemetry collector could not start its periodic tasks");
            return false;
        }

        lifecycle.subscriptions = handlers::subscribe(core);
        lifecycle.shutdown = Some(tx);
        lifecycle.running = true;
        info!(
            subscriptions = lifecycle.subscriptions.len(),
            windows = self.core.config().windows.len(),
            "Telemetry collector started"
        );
        true
    }

    /// Unsubscribe and stop the periodic loops.
    pub async fn stop(&self) {
        let (shutdown, subscriptions) = {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.running {
                return;
            }
            lifecycle.running = false;
            (lifecycle.shutdown.take(), std::mem::take(&mut lifecycle.subscriptions))
        };

        for id in &subscriptions {
            self.core.bus().unsubscribe(id);
        }
        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }
        self.supervisor.shutdown().await;
        info!("Telemetry collector stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().running
    }

    // -------------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------------

    /// Buffer a sample for `name`. Returns false for NaN or infinite values.
    pub fn record_metric(&self, name: &str, value: f64) -> bool {
        self.core.record_metric(name, value)
    }

    pub fn increment_counter(&self, name: &str, amount: u64) -> u64 {
        self.core.increment_counter(name, amount)
    }

    /// Set or update the levels for a metric pattern. Unset levels keep
    /// their previous value.
    pub fn set_alert_threshold(&self, pattern: &str, threshold: Threshold) {
        let mut state = self.core.state.lock();
        state
            .thresholds
            .entry(pattern.to_string())
            .or_default()
            .merge(threshold);
    }

    // -------------------------------------------------------------------------
    // Periodic work, callable directly
    // -------------------------------------------------------------------------

    /// Aggregate one window now. Returns the number of metrics aggregated.
    pub fn aggregate_window(&self, window: &str) -> usize {
        self.core.aggregate_window(window, unix_now())
    }

    /// Run one anomaly pass now. Returns the number of anomalies found.
    pub fn run_anomaly_pass(&self) -> usize {
        self.core.detect_anomalies(unix_now())
    }

    /// Run maintenance now. Returns the number of alerts expired.
    pub fn run_maintenance(&self) -> usize {
        self.core.maintain(unix_now())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Latest value per metric, optionally filtered by pattern.
    #[must_use]
    pub fn metrics(&self, pattern: Option<&str>) -> BTreeMap<String, f64> {
        self.core.metrics(pattern)
    }

    #[must_use]
    pub fn counters(&self, pattern: Option<&str>) -> BTreeMap<String, u64> {
        self.core.counters(pattern)
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.core.counter(name)
    }

    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.core.state.lock().alerts.alerts().cloned().collect()
    }

    /// Up to `limit` anomalies, newest first.
    #[must_use]
    pub fn anomalies(&self, limit: usize) -> Vec<Anomaly> {
        self.core
            .state
            .lock()
            .anomalies
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Statistics for `metric` over `window`: computed live for realtime,
    /// otherwise the most recent stored aggregate.
    #[must_use]
    pub fn statistics(&self, metric: &str, window: &str) -> Option<WindowStatistics> {
        self.core.statistics(metric, window)
    }

    #[must_use]
    pub fn assess_health(&self) -> HealthAssessment {
        self.core.assess_health(unix_now())
    }

    /// Build a report and persist it under `reports.system.<stamp>`.
    pub fn generate_report(&self) -> TelemetryReport {
        self.core.report(unix_now())
    }
}
