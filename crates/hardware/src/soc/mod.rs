//! Platform description components.
//!
//! This module organizes what the OS is told about the platform: the reserved PIM memory,
//! the device tree model and its augmentation, and the default board generator.

/// Default platform device tree generator.
pub mod board;

/// Device tree model, reserved-memory augmentation, and blob serialization.
pub mod fdt;

/// Validated PIM memory reservations.
pub mod reservation;

pub use reservation::{MemoryRegion, ReservationPolicy};
