//! # In-Memory Store
//!
//! A `HashMap` behind a single `parking_lot::Mutex`. The optional sweeper is an
//! OS thread, independent of any async runtime, that evicts expired entries
//! on a fixed interval. Loop-driven writers and the sweeper share the same
//! lock; nothing touches the map without it.
//!
//! ```text
//!   async loop ──set/get/keys──┐
//!                              ▼
//!                     Mutex<StoreState>
//!                              ▲
//!   sweeper thread ──purge─────┘   (every sweep_interval, stops on drop)
//! ```

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use shared_types::matches_filter;
use tracing::{debug, trace, warn};

use crate::port::{Store, StoreStats};

/// Default interval between TTL sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Interval of the background sweeper; `None` disables it and relies on
    /// lazy expiry at read time.
    pub sweep_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<String, Entry>,
    stats: StoreStats,
}

impl StoreState {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        removed
    }
}

struct Sweeper {
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Store sweeper thread panicked");
            }
        }
    }
}

/// Thread-safe in-memory implementation of [`Store`].
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    _sweeper: Option<Sweeper>,
}

impl InMemoryStore {
    /// Store without a background sweeper.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            _sweeper: None,
        }
    }

    #[must_use]
    pub fn with_config(config: &StoreConfig) -> Self {
        match config.sweep_interval {
            Some(interval) => Self::with_sweeper(interval),
            None => Self::new(),
        }
    }

    /// Store with a sweeper thread evicting expired entries every `interval`.
    #[must_use]
    pub fn with_sweeper(interval: Duration) -> Self {
        let state = Arc::new(Mutex::new(StoreState::default()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let swept = Arc::clone(&state);

        let spawned = std::thread::Builder::new()
            .name("store-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let removed = swept.lock().purge_expired(Instant::now());
                        if removed > 0 {
                            debug!(removed, "Swept expired store entries");
                        } else {
                            trace!("Store sweep found nothing to expire");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        let sweeper = match spawned {
            Ok(handle) => Some(Sweeper {
                stop_tx,
                handle: Some(handle),
            }),
            Err(e) => {
                warn!(error = %e, "Failed to spawn store sweeper; relying on lazy expiry");
                None
            }
        };

        Self {
            state,
            _sweeper: sweeper,
        }
    }

    /// Evict expired entries now. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        self.state.lock().purge_expired(Instant::now())
    }

    /// Number of entries, including any expired but not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: &str, value: Value, expires_at: Option<Instant>) {
        let mut state = self.state.lock();
        state.stats.sets += 1;
        state
            .entries
            .insert(key.to_string(), Entry { value, expires_at });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.stats.gets += 1;

        match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                state.stats.hits += 1;
                return Some(entry.value.clone());
            }
            Some(_) => {
                state.entries.remove(key);
                state.stats.expirations += 1;
            }
            None => {}
        }
        state.stats.misses += 1;
        None
    }

    fn set(&self, key: &str, value: Value) {
        self.insert(key, value, None);
    }

    fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        self.insert(key, value, Some(Instant::now() + ttl));
    }

    fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.stats.deletes += 1;
        }
        removed
    }

    fn keys(&self, pattern: Option<&str>) -> Vec<String> {
        let mut state = self.state.lock();
        state.purge_expired(Instant::now());
        let mut keys: Vec<String> = state
            .entries
            .keys()
            .filter(|k| matches_filter(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn stats(&self) -> StoreStats {
        let state = self.state.lock();
        StoreStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }
}
