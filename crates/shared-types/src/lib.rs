//! # Shared Types Crate
//!
//! Types shared by every crate of the mediation runtime.
//!
//! ## Contents
//!
//! - **Patterns**: glob matching used by the bus, the store and telemetry
//! - **Clock**: unix/ISO timestamps and sortable key stamps
//! - **Security**: `PermissionLevel` ordinals and per-call `SecurityContext`
//! - **Errors**: the four-kind `CallError` taxonomy and `HandlerError`

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod clock;
pub mod errors;
pub mod pattern;
pub mod security;

pub use clock::{iso_now, key_stamp, unix_now};
pub use errors::*;
pub use pattern::{is_wildcard, matches_filter, wildcard_match};
pub use security::*;
