//! Processor abstraction.
//!
//! The core models themselves live in the simulation engine. This module defines the handle
//! the boot orchestrator uses to switch them and retune them, plus a reference implementation.

/// Core variants, tunables, and the switchable processor.
pub mod processor;

pub use self::processor::{CoreTunables, CoreVariant, Processor, SwitchableProcessor};
