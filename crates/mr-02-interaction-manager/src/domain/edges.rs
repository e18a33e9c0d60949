//! Permission edges and per-edge deadlines.
//!
//! One entry per ordered `(source, target)` pair; the last registration
//! wins. Both tables are read-only while a call is in flight.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use shared_types::{CallError, DenialReason, PermissionLevel, SecurityContext};

/// Wildcard target for a source-wide timeout.
pub const ANY_TARGET: &str = "*";

/// Registered edges and the level each one requires.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    edges: BTreeMap<String, BTreeMap<String, PermissionLevel>>,
}

impl PermissionRegistry {
    pub fn register(&mut self, source: &str, target: &str, level: PermissionLevel) {
        self.edges
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string(), level);
    }

    #[must_use]
    pub fn required_level(&self, source: &str, target: &str) -> Option<PermissionLevel> {
        self.edges.get(source)?.get(target).copied()
    }

    /// Check an edge; a missing context passes any registered edge.
    pub fn check(
        &self,
        source: &str,
        target: &str,
        context: Option<&SecurityContext>,
    ) -> Result<PermissionLevel, CallError> {
        let edge = || format!("{source}:{target}");
        let Some(required) = self.required_level(source, target) else {
            return Err(CallError::PermissionDenied {
                edge: edge(),
                reason: DenialReason::Unregistered,
            });
        };

        match context {
            Some(ctx) if !ctx.satisfies(required) => Err(CallError::PermissionDenied {
                edge: edge(),
                reason: DenialReason::InsufficientLevel {
                    required,
                    actual: ctx.level,
                },
            }),
            _ => Ok(required),
        }
    }

    /// Targets `source` may call, filtered by `context` when present.
    #[must_use]
    pub fn allowed_targets(&self, source: &str, context: Option<&SecurityContext>) -> Vec<String> {
        self.edges.get(source).map_or_else(Vec::new, |targets| {
            targets
                .iter()
                .filter(|(_, level)| context.map_or(true, |ctx| ctx.satisfies(**level)))
                .map(|(target, _)| target.clone())
                .collect()
        })
    }

    /// Sources that may call `target`, filtered by `context` when present.
    #[must_use]
    pub fn allowed_sources(&self, target: &str, context: Option<&SecurityContext>) -> Vec<String> {
        self.edges
            .iter()
            .filter_map(|(source, targets)| {
                let level = targets.get(target)?;
                context
                    .map_or(true, |ctx| ctx.satisfies(*level))
                    .then(|| source.clone())
            })
            .collect()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }
}

/// Call deadlines: edge-specific, then source-wide, then the default.
#[derive(Debug)]
pub struct TimeoutTable {
    entries: HashMap<String, Duration>,
    default: Duration,
}

impl TimeoutTable {
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// `target` may be [`ANY_TARGET`] to cover every edge of `source`.
    pub fn set(&mut self, source: &str, target: &str, timeout: Duration) {
        self.entries.insert(format!("{source}:{target}"), timeout);
    }

    #[must_use]
    pub fn resolve(&self, source: &str, target: &str) -> Duration {
        self.entries
            .get(&format!("{source}:{target}"))
            .or_else(|| self.entries.get(&format!("{source}:{ANY_TARGET}")))
            .copied()
            .unwrap_or(self.default)
    }
}
