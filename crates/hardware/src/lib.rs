//! Boot orchestration for a PIM-augmented full-system simulation.
//!
//! This crate implements the part of a full-system run that sits between the configuration
//! and the simulation engine:
//! 1. **Reservations:** The physical windows owned by the PIM device, validated once.
//! 2. **Firmware:** Appending a `reserved-memory` node to the generated device tree and flattening it.
//! 3. **Boot plan:** Kernel command line, checkpoint resume decision, and consistency checks.
//! 4. **Orchestration:** The exit-signal state machine that switches fast cores to detailed ones.
//! 5. **Host loop:** Driving an external engine and dispatching its exit signals.

/// Common types (addresses, constants, errors).
pub mod common;
/// Configuration (defaults, hierarchical config structures).
pub mod config;
/// Processor handle and switchable core models.
pub mod core;
/// Boot planning, orchestration, and the run loop.
pub mod sim;
/// Reservations, device tree, and board generator.
pub mod soc;

/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// Validated boot inputs; construct with `BootPlan::prepare`.
pub use crate::sim::BootPlan;
/// Host run loop.
pub use crate::sim::Simulator;
