//! Per-edge interaction statistics.
//!
//! Counters are lifetime counters: they never decay and are cleared only by
//! [`StatsBook::reset`].

use std::collections::BTreeMap;

use serde::Serialize;

/// Which per-edge counter to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Requests,
    Successes,
    Errors,
    Timeouts,
    Fallbacks,
    PermissionErrors,
    SecurityErrors,
}

/// Raw counters for one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeCounters {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub fallbacks: u64,
    pub permission_errors: u64,
    pub security_errors: u64,
    pub latency_sum: f64,
    pub latency_count: u64,
    pub latency_max: f64,
}

impl EdgeCounters {
    pub fn bump(&mut self, counter: Counter) {
        let slot = match counter {
            Counter::Requests => &mut self.requests,
            Counter::Successes => &mut self.successes,
            Counter::Errors => &mut self.errors,
            Counter::Timeouts => &mut self.timeouts,
            Counter::Fallbacks => &mut self.fallbacks,
            Counter::PermissionErrors => &mut self.permission_errors,
            Counter::SecurityErrors => &mut self.security_errors,
        };
        *slot += 1;
    }

    pub fn record_latency(&mut self, duration_ms: f64) {
        self.latency_sum += duration_ms;
        self.latency_count += 1;
        self.latency_max = self.latency_max.max(duration_ms);
    }

    fn avg_latency(&self) -> f64 {
        if self.latency_count == 0 {
            0.0
        } else {
            self.latency_sum / self.latency_count as f64
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Derived view of one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStats {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub fallbacks: u64,
    pub permission_errors: u64,
    pub security_errors: u64,
    pub error_rate: f64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
}

impl From<&EdgeCounters> for EdgeStats {
    fn from(c: &EdgeCounters) -> Self {
        Self {
            requests: c.requests,
            successes: c.successes,
            errors: c.errors,
            timeouts: c.timeouts,
            fallbacks: c.fallbacks,
            permission_errors: c.permission_errors,
            security_errors: c.security_errors,
            error_rate: ratio(c.errors, c.requests),
            success_rate: ratio(c.successes, c.requests),
            avg_latency_ms: c.avg_latency(),
            max_latency_ms: c.latency_max,
        }
    }
}

/// Totals over a set of edges, with per-edge detail keyed source then target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_errors: u64,
    pub total_timeouts: u64,
    pub total_fallbacks: u64,
    pub error_rate: f64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub edges: BTreeMap<String, BTreeMap<String, EdgeStats>>,
}

impl StatsSummary {
    fn from_edges<'a>(edges: impl Iterator<Item = (&'a String, &'a String, &'a EdgeCounters)>) -> Self {
        let mut summary = Self::default();
        let mut latency_sum = 0.0;
        let mut latency_count = 0u64;

        for (source, target, c) in edges {
            summary.total_requests += c.requests;
            summary.total_successes += c.successes;
            summary.total_errors += c.errors;
            summary.total_timeouts += c.timeouts;
            summary.total_fallbacks += c.fallbacks;
            latency_sum += c.latency_sum;
            latency_count += c.latency_count;
            summary.max_latency_ms = summary.max_latency_ms.max(c.latency_max);
            summary
                .edges
                .entry(source.clone())
                .or_default()
                .insert(target.clone(), EdgeStats::from(c));
        }

        summary.error_rate = ratio(summary.total_errors, summary.total_requests);
        summary.success_rate = ratio(summary.total_successes, summary.total_requests);
        if latency_count > 0 {
            summary.avg_latency_ms = latency_sum / latency_count as f64;
        }
        summary
    }
}

/// Granularity for [`StatsBook::reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    All,
    Source(String),
    Edge { source: String, target: String },
}

/// Counters for every edge that has seen a call.
#[derive(Debug, Default)]
pub struct StatsBook {
    edges: BTreeMap<String, BTreeMap<String, EdgeCounters>>,
}

impl StatsBook {
    pub fn edge_mut(&mut self, source: &str, target: &str) -> &mut EdgeCounters {
        self.edges
            .entry(source.to_string())
            .or_default()
            .entry(target.to_string())
            .or_default()
    }

    pub fn bump(&mut self, source: &str, target: &str, counter: Counter) {
        self.edge_mut(source, target).bump(counter);
    }

    #[must_use]
    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from_edges(
            self.edges
                .iter()
                .flat_map(|(s, targets)| targets.iter().map(move |(t, c)| (s, t, c))),
        )
    }

    #[must_use]
    pub fn source_summary(&self, source: &str) -> Option<StatsSummary> {
        let (s, targets) = self.edges.get_key_value(source)?;
        Some(StatsSummary::from_edges(
            targets.iter().map(move |(t, c)| (s, t, c)),
        ))
    }

    #[must_use]
    pub fn edge(&self, source: &str, target: &str) -> Option<EdgeStats> {
        self.edges.get(source)?.get(target).map(EdgeStats::from)
    }

    pub fn reset(&mut self, scope: &StatsScope) {
        match scope {
            StatsScope::All => self.edges.clear(),
            StatsScope::Source(source) => {
                if let Some(targets) = self.edges.get_mut(source) {
                    targets.clear();
                }
            }
            StatsScope::Edge { source, target } => {
                if let Some(counters) = self.edges.get_mut(source).and_then(|t| t.get_mut(target)) {
                    *counters = EdgeCounters::default();
                }
            }
        }
    }
}
