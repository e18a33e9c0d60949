//! Mediator domain: permission edges, deadlines, traces and statistics.

pub mod edges;
pub mod stats;
pub mod trace;

pub use edges::{PermissionRegistry, TimeoutTable, ANY_TARGET};
pub use stats::{Counter, EdgeCounters, EdgeStats, StatsBook, StatsScope, StatsSummary};
pub use trace::{InteractionTrace, TraceStatus, PAYLOAD_SUMMARY_CHARS};
