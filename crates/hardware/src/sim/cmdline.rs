//! Kernel command line construction and reservation cross-checking.
//!
//! The OS learns about the PIM windows twice: from the device tree's `reserved-memory` node
//! and from `memmap=<size>$<base>` exclusions on the kernel command line. Both are derived
//! from the same [`ReservationPolicy`], and [`verify_reservations`] proves they agree before
//! any guest code runs. This module provides:
//! 1. **Construction:** Base arguments followed by one exclusion per marked region.
//! 2. **Parsing:** `memmap=` arguments using the kernel's size syntax (`0x` hex, decimal, `K/M/G` suffixes).
//! 3. **Cross-checks:** Command line against the firmware tree and against the policy.

use serde::Serialize;
use tracing::debug;

use crate::common::constants::{
    MEMMAP_PREFIX, RESERVED_ADDRESS_CELLS, RESERVED_MEMORY_NODE, RESERVED_SIZE_CELLS,
};
use crate::common::{AddrRange, InconsistentReservationError};
use crate::soc::fdt::{FdtNode, decode_reg};
use crate::soc::reservation::{MemoryRegion, ReservationPolicy};

/// Ordered list of kernel arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KernelCmdline {
    args: Vec<String>,
}

impl KernelCmdline {
    /// Builds the command line: `base_args` in order, then one `memmap=` exclusion for every
    /// region of `policy` marked for command line exclusion.
    pub fn new(base_args: &[String], policy: &ReservationPolicy) -> Self {
        let mut args = base_args.to_vec();
        args.extend(policy.cmdline_exclusions().map(memmap_arg));
        Self { args }
    }

    /// Wraps an already assembled argument list.
    pub const fn from_args(args: Vec<String>) -> Self {
        Self { args }
    }

    /// The arguments in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The arguments joined with spaces, as placed in `/chosen/bootargs`.
    pub fn to_bootargs(&self) -> String {
        self.args.join(" ")
    }

    /// Every `$` (reserved) exclusion on the command line, in argument order.
    pub fn exclusions(&self) -> Result<Vec<AddrRange>, InconsistentReservationError> {
        let mut ranges = Vec::new();
        for arg in &self.args {
            ranges.extend(parse_memmap(arg)?);
        }
        Ok(ranges)
    }
}

/// Formats the exclusion argument for `region`, e.g. `memmap=0x10000000$0xC0004000`.
pub fn memmap_arg(region: &MemoryRegion) -> String {
    format!("{MEMMAP_PREFIX}{:#X}${:#X}", region.size, region.base)
}

/// Parses the reserved (`$`) exclusions in one kernel argument.
///
/// Arguments other than `memmap=` yield nothing, as do `memmap=` entries of the other kinds
/// (`@` usable, `#` ACPI, `!` persistent) and `memmap=exactmap`.
pub fn parse_memmap(arg: &str) -> Result<Vec<AddrRange>, InconsistentReservationError> {
    let Some(entries) = arg.strip_prefix(MEMMAP_PREFIX) else {
        return Ok(Vec::new());
    };
    let malformed = || InconsistentReservationError::MalformedArgument(arg.to_string());

    let mut ranges = Vec::new();
    for entry in entries.split(',') {
        if entry == "exactmap" {
            continue;
        }
        if let Some((size, base)) = entry.split_once('$') {
            let size = parse_size(size).ok_or_else(malformed)?;
            let base = parse_size(base).ok_or_else(malformed)?;
            ranges.push(AddrRange::new(base, size));
        } else if entry.contains(['@', '#', '!']) {
            continue;
        } else {
            return Err(malformed());
        }
    }
    Ok(ranges)
}

/// Parses a kernel size: `0x` hex or decimal, with an optional binary `K`/`M`/`G`/`T` suffix.
fn parse_size(text: &str) -> Option<u64> {
    let (digits, shift) = match text.as_bytes().last()? {
        b'k' | b'K' => (&text[..text.len() - 1], 10),
        b'm' | b'M' => (&text[..text.len() - 1], 20),
        b'g' | b'G' => (&text[..text.len() - 1], 30),
        b't' | b'T' => (&text[..text.len() - 1], 40),
        _ => (text, 0),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    value.checked_mul(1_u64 << shift)
}

/// Collects `(node name, range)` for every statically placed child of every top-level
/// `reserved-memory` node.
///
/// `reg` is decoded with the parent's `#address-cells` and `#size-cells`, two cells each when
/// the parent does not declare them. A child without `reg` (a CMA pool sized with `size`, for
/// example) is allocated by the kernel at boot and has no fixed range, so it is skipped.
pub fn tree_reservations(
    root: &FdtNode,
) -> Result<Vec<(String, AddrRange)>, InconsistentReservationError> {
    let mut reservations = Vec::new();
    for reserved in root.children_named(RESERVED_MEMORY_NODE) {
        let address_cells = cell_width(reserved, "#address-cells").unwrap_or(RESERVED_ADDRESS_CELLS);
        let size_cells = cell_width(reserved, "#size-cells").unwrap_or(RESERVED_SIZE_CELLS);
        for child in reserved.children() {
            let Some(reg) = child.property("reg") else {
                debug!(node = %child.name(), "skipping dynamically placed reservation");
                continue;
            };
            let entries = reg
                .as_cells()
                .and_then(|cells| decode_reg(&cells, address_cells, size_cells))
                .ok_or_else(|| InconsistentReservationError::MalformedReg(child.name().to_string()))?;
            reservations.extend(
                entries
                    .into_iter()
                    .map(|(base, size)| (child.name().to_string(), AddrRange::new(base, size))),
            );
        }
    }
    Ok(reservations)
}

fn cell_width(node: &FdtNode, property: &str) -> Option<u32> {
    node.property(property)?.as_cells()?.first().copied()
}

/// Checks that every `memmap=` exclusion matches a reserved-memory node bit-for-bit.
pub fn verify_reservations(
    root: &FdtNode,
    cmdline: &KernelCmdline,
) -> Result<(), InconsistentReservationError> {
    let reservations = tree_reservations(root)?;
    for exclusion in cmdline.exclusions()? {
        let Some((name, range)) = reservations.iter().find(|(_, r)| r.base == exclusion.base) else {
            return Err(InconsistentReservationError::MissingNode {
                base: exclusion.base,
                size: exclusion.size,
            });
        };
        if range.size != exclusion.size {
            return Err(InconsistentReservationError::SizeMismatch {
                base: exclusion.base,
                tree_size: range.size,
                cmdline_size: exclusion.size,
            });
        }
        debug!(node = %name, range = %range, "command line exclusion matches device tree");
    }
    Ok(())
}

/// Checks that every region marked for exclusion appears on the command line exactly.
pub fn verify_exclusions(
    policy: &ReservationPolicy,
    cmdline: &KernelCmdline,
) -> Result<(), InconsistentReservationError> {
    let exclusions = cmdline.exclusions()?;
    for region in policy.cmdline_exclusions() {
        if !exclusions.contains(&region.range()) {
            return Err(InconsistentReservationError::MissingExclusion {
                base: region.base,
                size: region.size,
            });
        }
    }
    Ok(())
}
