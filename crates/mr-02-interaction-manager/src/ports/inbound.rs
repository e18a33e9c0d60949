//! # Inbound Port - InteractionApi
//!
//! Driving port used by modules that call each other through the mediator.
//!
//! | Method | Effect |
//! |--------|--------|
//! | `register_edge` | allow `source` to call `target` at a required level |
//! | `call` | mediated call with permission check, circuit and deadline |
//! | `is_interaction_allowed` | permission check without calling |

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared_types::{CallResult, PermissionLevel, SecurityContext};

/// Primary API of the interaction manager.
#[async_trait]
pub trait InteractionApi: Send + Sync {
    /// Register (or replace) the edge `source -> target`.
    fn register_edge(
        &self,
        source: &str,
        target: &str,
        level: PermissionLevel,
        timeout: Option<Duration>,
    );

    /// Call `target` on behalf of `source`.
    ///
    /// # Errors
    /// - `PermissionDenied`: no edge, or `context` below the edge's level
    /// - `Timeout`, `CircuitOpen`, `Execution`: only when fallbacks are off
    async fn call(
        &self,
        source: &str,
        target: &str,
        payload: Value,
        context: Option<&SecurityContext>,
    ) -> CallResult<Value>;

    fn is_interaction_allowed(
        &self,
        source: &str,
        target: &str,
        context: Option<&SecurityContext>,
    ) -> bool;
}
