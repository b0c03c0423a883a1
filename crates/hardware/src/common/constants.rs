//! Global constants.
//!
//! This module defines constants shared across the crate. It includes:
//! 1. **Memory Constants:** Page size used as the reservation granularity.
//! 2. **Device Tree Constants:** Cell widths and well-known node and property names.
//! 3. **Boot Constants:** The kernel argument prefix used for memory exclusion.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: u64 = 4096;

/// Granularity every reserved region's base and size must be aligned to.
///
/// The kernel's `memmap=` exclusion works on whole pages, and a page is a multiple
/// of the 32-bit device tree cell, so page alignment satisfies both consumers.
pub const RESERVATION_ALIGN: u64 = PAGE_SIZE;

/// `#address-cells` value of the reserved-memory node (64-bit addresses).
pub const RESERVED_ADDRESS_CELLS: u32 = 2;

/// `#size-cells` value of the reserved-memory node (64-bit sizes).
pub const RESERVED_SIZE_CELLS: u32 = 2;

/// Name of the device tree node that lists reserved physical memory.
pub const RESERVED_MEMORY_NODE: &str = "reserved-memory";

/// Presence-only property telling the OS not to create a linear mapping for a region.
pub const PROP_NO_MAP: &str = "no-map";

/// Property marking how much of a node's range the OS may use; `<0>` means none.
pub const PROP_USABLE_MEMORY: &str = "linux,usable-memory";

/// Kernel command line prefix for a physical memory exclusion (`memmap=<size>$<base>`).
pub const MEMMAP_PREFIX: &str = "memmap=";
