//! Circuit domain: the per-edge state machine and its persisted form.

pub mod circuit;
pub mod state;

pub use circuit::{Circuit, CircuitRecord};
pub use state::{Admission, CircuitState, Transition};
