//! Common types shared by the firmware, processor, and simulation modules.
//!
//! This module provides:
//! 1. **Address Types:** Half-open physical address ranges.
//! 2. **Constants:** Reservation granularity and device tree cell layout.
//! 3. **Error Handling:** Configuration, switch, and consistency error types.

/// Physical address ranges.
pub mod addr;

/// Common constants used throughout the crate.
pub mod constants;

/// Error types.
pub mod error;

pub use addr::AddrRange;
pub use error::{
    BootError, ConfigError, FdtError, InconsistentReservationError, IoFailure, OrchestratorError,
    SwitchError,
};
