//! # Call Security Levels
//!
//! Every permission edge carries a required [`PermissionLevel`]. A caller may
//! attach a [`SecurityContext`]; when it does, its level must be at least the
//! edge's requirement.
//!
//! ```text
//! NONE(0) < READ(10) < NORMAL(20) < ELEVATED(30) < ADMIN(40) < SYSTEM(50)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// PERMISSION LEVEL
// =============================================================================

/// Ordered privilege level. Comparison follows the numeric ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    None = 0,
    Read = 10,
    Normal = 20,
    Elevated = 30,
    Admin = 40,
    System = 50,
}

impl PermissionLevel {
    /// Numeric ordinal of this level.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Highest level whose ordinal does not exceed `value`.
    #[must_use]
    pub fn from_ordinal(value: u8) -> Self {
        match value {
            50.. => Self::System,
            40..=49 => Self::Admin,
            30..=39 => Self::Elevated,
            20..=29 => Self::Normal,
            10..=19 => Self::Read,
            _ => Self::None,
        }
    }
}

impl Default for PermissionLevel {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Read => "READ",
            Self::Normal => "NORMAL",
            Self::Elevated => "ELEVATED",
            Self::Admin => "ADMIN",
            Self::System => "SYSTEM",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// SECURITY CONTEXT
// =============================================================================

/// Per-call security context. Never persisted by the mediator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub level: PermissionLevel,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl SecurityContext {
    #[must_use]
    pub fn new(level: PermissionLevel) -> Self {
        Self {
            level,
            attributes: HashMap::new(),
        }
    }

    /// Attach an attribute, builder style.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// True if this context satisfies `required`.
    #[must_use]
    pub fn satisfies(&self, required: PermissionLevel) -> bool {
        self.level >= required
    }
}
