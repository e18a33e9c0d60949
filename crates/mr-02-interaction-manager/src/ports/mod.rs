//! Ports for the interaction manager.

pub mod inbound;

pub use inbound::InteractionApi;
