//! Physical memory reservations for the PIM device.
//!
//! A [`ReservationPolicy`] is the single source of truth for the memory the OS must not
//! allocate: both the device tree `reserved-memory` node and the kernel's `memmap=`
//! exclusions are derived from it. Validation happens once, at construction:
//! 1. **Shape:** Every region is non-empty, does not overflow, and has a usable label.
//! 2. **Alignment:** Base and size are multiples of [`RESERVATION_ALIGN`].
//! 3. **Placement:** Every region lies inside the RAM window.
//! 4. **Disjointness:** No two regions share a byte.

use serde::Serialize;
use tracing::debug;

use crate::common::constants::RESERVATION_ALIGN;
use crate::common::{AddrRange, ConfigError};
use crate::config::{MemoryConfig, ReservedRegionConfig};

/// A physical address range reserved for the accelerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    /// Label used for the device tree node name.
    pub label: String,
    /// Physical base address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
    /// Whether the OS may allocate from the region.
    pub usable_by_os: bool,
    /// Whether the OS must not map the region.
    pub no_map: bool,
    /// Whether the region is also excluded with a `memmap=` kernel argument.
    pub exclude_in_cmdline: bool,
}

impl MemoryRegion {
    /// Creates an OS-unusable, unmapped region that is not excluded on the command line.
    pub fn new(label: impl Into<String>, base: u64, size: u64) -> Self {
        Self {
            label: label.into(),
            base,
            size,
            usable_by_os: false,
            no_map: true,
            exclude_in_cmdline: false,
        }
    }

    /// Marks the region for exclusion on the kernel command line.
    #[must_use]
    pub const fn excluded_in_cmdline(mut self) -> Self {
        self.exclude_in_cmdline = true;
        self
    }

    /// The region's address range.
    pub const fn range(&self) -> AddrRange {
        AddrRange::new(self.base, self.size)
    }

    /// Device tree node name, `<label>@<base in lowercase hex>`.
    pub fn node_name(&self) -> String {
        format!("{}@{:x}", self.label, self.base)
    }
}

impl From<&ReservedRegionConfig> for MemoryRegion {
    fn from(config: &ReservedRegionConfig) -> Self {
        Self {
            label: config.label.clone(),
            base: config.base,
            size: config.size,
            usable_by_os: config.usable_by_os,
            no_map: config.no_map,
            exclude_in_cmdline: config.exclude_in_cmdline,
        }
    }
}

/// A validated, immutable set of reserved regions inside a RAM window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationPolicy {
    ram: AddrRange,
    regions: Vec<MemoryRegion>,
}

impl ReservationPolicy {
    /// Validates `regions` against `ram` and builds the policy.
    ///
    /// Region order is preserved; it determines the order of the device tree children.
    pub fn new(ram: AddrRange, regions: Vec<MemoryRegion>) -> Result<Self, ConfigError> {
        if ram.is_empty() || ram.end().is_none() {
            return Err(ConfigError::InvalidRamWindow(ram));
        }
        for region in &regions {
            validate_region(ram, region)?;
        }

        let mut sorted: Vec<&MemoryRegion> = regions.iter().collect();
        sorted.sort_by_key(|region| region.base);
        for pair in sorted.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.range().overlaps(&second.range()) {
                return Err(ConfigError::Overlap {
                    first: first.label.clone(),
                    first_range: first.range(),
                    second: second.label.clone(),
                    second_range: second.range(),
                });
            }
        }

        debug!(ram = %ram, count = regions.len(), "validated memory reservations");
        Ok(Self { ram, regions })
    }

    /// Builds the policy from the memory section of the configuration.
    pub fn from_config(memory: &MemoryConfig) -> Result<Self, ConfigError> {
        Self::new(
            memory.ram_window(),
            memory.reserved.iter().map(MemoryRegion::from).collect(),
        )
    }

    /// The RAM window the regions were validated against.
    pub const fn ram_window(&self) -> AddrRange {
        self.ram
    }

    /// The reserved regions in configuration order.
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Returns `true` when nothing is reserved.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions the kernel command line must exclude with `memmap=`.
    pub fn cmdline_exclusions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.iter().filter(|region| region.exclude_in_cmdline)
    }

    /// The parts of the RAM window the OS may use: the window minus every region that is
    /// not usable by the OS, in ascending address order.
    pub fn usable_windows(&self) -> Vec<AddrRange> {
        let mut holes: Vec<AddrRange> = self
            .regions
            .iter()
            .filter(|region| !region.usable_by_os)
            .map(MemoryRegion::range)
            .collect();
        holes.sort_by_key(|range| range.base);

        let ram_end = self.ram.base + self.ram.size;
        let mut windows = Vec::with_capacity(holes.len() + 1);
        let mut cursor = self.ram.base;
        for hole in holes {
            if hole.base > cursor {
                windows.push(AddrRange::new(cursor, hole.base - cursor));
            }
            cursor = cursor.max(hole.base + hole.size);
        }
        if ram_end > cursor {
            windows.push(AddrRange::new(cursor, ram_end - cursor));
        }
        windows
    }
}

fn validate_region(ram: AddrRange, region: &MemoryRegion) -> Result<(), ConfigError> {
    if !is_valid_label(&region.label) {
        return Err(ConfigError::InvalidLabel(region.label.clone()));
    }
    if region.size == 0 {
        return Err(ConfigError::EmptyRegion {
            label: region.label.clone(),
            base: region.base,
        });
    }
    if region.range().end().is_none() {
        return Err(ConfigError::RegionOverflow {
            label: region.label.clone(),
            base: region.base,
            size: region.size,
        });
    }
    if region.base % RESERVATION_ALIGN != 0 || region.size % RESERVATION_ALIGN != 0 {
        return Err(ConfigError::Misaligned {
            label: region.label.clone(),
            range: region.range(),
            align: RESERVATION_ALIGN,
        });
    }
    if !ram.contains(&region.range()) {
        return Err(ConfigError::OutsideRam {
            label: region.label.clone(),
            range: region.range(),
            ram,
        });
    }
    Ok(())
}

/// Node names allow `[A-Za-z0-9,._+-]`; the unit address is appended separately.
fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 31
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '_' | '+' | '-'))
}
