//! # Module Runtime Test Suite
//!
//! Scenarios that span more than one component. Unit tests stay next to
//! the code they cover; everything here wires real components together
//! over a shared bus and store.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── bus_routing.rs        # wildcard delivery, unsubscribe, async joins
//!     ├── circuit_recovery.rs   # CLOSED → OPEN → HALF_OPEN → CLOSED, rehydration
//!     ├── mediation.rs          # permissions, deadlines, fallbacks, traces
//!     └── telemetry_pipeline.rs # calls feeding counters, alerts and health
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mr-tests
//! cargo test -p mr-tests integration::circuit_recovery
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
