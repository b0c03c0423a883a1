//! Error types for boot preparation and orchestration.
//!
//! This module defines the failure modes of the boot core. It provides:
//! 1. **Configuration Errors:** Invalid or overlapping reservations and unreadable configuration.
//! 2. **Switch Errors:** The processor refusing or failing a core model switch.
//! 3. **Consistency Errors:** Firmware tree and kernel command line disagreeing about a reservation.
//! 4. **Umbrella Error:** `BootError`, which every fallible top-level operation returns.
//!
//! Configuration and consistency errors are raised before any guest code runs; switch errors
//! abort the run loop.

use std::io;
use std::sync::Arc;
use std::{error, fmt};

use thiserror::Error;

use super::addr::AddrRange;
use crate::core::CoreVariant;

/// An I/O error that can be cloned and compared as part of a [`ConfigError`].
///
/// Two failures are equal when they have the same kind and message.
#[derive(Debug, Clone)]
pub struct IoFailure(Arc<io::Error>);

impl IoFailure {
    /// The kind of the underlying error.
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }

    /// The underlying error.
    pub fn io_error(&self) -> &io::Error {
        &self.0
    }
}

impl From<io::Error> for IoFailure {
    fn from(err: io::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Display for IoFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl error::Error for IoFailure {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        error::Error::source(&*self.0)
    }
}

impl PartialEq for IoFailure {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.0.to_string() == other.0.to_string()
    }
}

impl Eq for IoFailure {}

/// Invalid configuration detected before the simulation starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The RAM window is empty or extends past the end of the address space.
    #[error("RAM window {0} is empty or overflows the address space")]
    InvalidRamWindow(AddrRange),

    /// A reserved region has zero size.
    #[error("reserved region `{label}` at {base:#x} is empty")]
    EmptyRegion {
        /// Region label.
        label: String,
        /// Region base address.
        base: u64,
    },

    /// A reserved region extends past the end of the 64-bit address space.
    #[error("reserved region `{label}` at {base:#x} with size {size:#x} overflows the address space")]
    RegionOverflow {
        /// Region label.
        label: String,
        /// Region base address.
        base: u64,
        /// Region size in bytes.
        size: u64,
    },

    /// A reserved region is not contained in the physical RAM window.
    #[error("reserved region `{label}` {range} lies outside the RAM window {ram}")]
    OutsideRam {
        /// Region label.
        label: String,
        /// The offending region.
        range: AddrRange,
        /// The RAM window it was checked against.
        ram: AddrRange,
    },

    /// A reserved region's base or size is not a whole number of pages.
    #[error("reserved region `{label}` {range} must start and end on a page boundary ({align:#x}-byte granularity)")]
    Misaligned {
        /// Region label.
        label: String,
        /// The offending region.
        range: AddrRange,
        /// Page granularity in bytes.
        align: u64,
    },

    /// Two reserved regions share at least one byte.
    #[error("reserved regions `{first}` {first_range} and `{second}` {second_range} overlap")]
    Overlap {
        /// Label of the earlier region.
        first: String,
        /// Range of the earlier region.
        first_range: AddrRange,
        /// Label of the later region.
        second: String,
        /// Range of the later region.
        second_range: AddrRange,
    },

    /// A region label cannot be used as a device tree node name.
    #[error("invalid reserved region label `{0}`")]
    InvalidLabel(String),

    /// The processor configuration has no cores.
    #[error("processor must have at least one core")]
    NoCores,

    /// The starting and switch core variants are the same, so there is nothing to switch to.
    #[error("starting and switch core variants are both {0}")]
    IdenticalVariants(CoreVariant),

    /// The configuration file could not be read.
    #[error("failed to read configuration `{path}`: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: IoFailure,
    },

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The base firmware tree cannot be augmented.
    #[error("malformed firmware tree: {0}")]
    MalformedTree(String),
}

/// Failure of the processor to switch core models.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwitchError {
    /// The processor has no cores to switch.
    #[error("processor has no cores to switch")]
    NoCores,

    /// A core is already running the destination model.
    #[error("core {core} is already running the {variant} model")]
    AlreadySwitched {
        /// Index of the core.
        core: usize,
        /// The model it is running.
        variant: CoreVariant,
    },

    /// After the switch a core still reports a model other than the destination.
    #[error("core {core} reports the {found} model after switching to {expected}")]
    Incomplete {
        /// Index of the core.
        core: usize,
        /// The model the switch should have produced.
        expected: CoreVariant,
        /// The model the core reports.
        found: CoreVariant,
    },

    /// The processor rejected the request for an implementation-specific reason.
    #[error("processor rejected the switch: {0}")]
    Rejected(String),
}

/// The firmware tree and the kernel command line disagree about a reservation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InconsistentReservationError {
    /// A command line exclusion has no reserved-memory node at the same base.
    #[error("memmap exclusion {size:#x}@{base:#x} has no matching reserved-memory node")]
    MissingNode {
        /// Excluded base address.
        base: u64,
        /// Excluded size.
        size: u64,
    },

    /// A reserved-memory node and a command line exclusion share a base but differ in size.
    #[error("reservation at {base:#x} is {tree_size:#x} bytes in the device tree but {cmdline_size:#x} bytes on the command line")]
    SizeMismatch {
        /// Shared base address.
        base: u64,
        /// Size declared by the device tree node.
        tree_size: u64,
        /// Size declared by the command line.
        cmdline_size: u64,
    },

    /// A reservation marked for exclusion has no `memmap` argument.
    #[error("reservation {size:#x}@{base:#x} must be excluded on the kernel command line but is not")]
    MissingExclusion {
        /// Reservation base address.
        base: u64,
        /// Reservation size.
        size: u64,
    },

    /// A `memmap=` argument could not be parsed.
    #[error("kernel argument `{0}` is not a valid memmap exclusion")]
    MalformedArgument(String),

    /// A reserved-memory child carries a `reg` property that does not decode with the parent's cell widths.
    #[error("reserved-memory node `{0}` has a malformed reg property")]
    MalformedReg(String),
}

/// Failure to flatten a firmware tree into a device tree blob.
#[derive(Debug, Error)]
pub enum FdtError {
    /// The underlying FDT writer rejected the tree.
    #[error("device tree serialization failed: {0}")]
    Writer(vm_fdt::Error),
}

/// Failure while the boot orchestrator handles an exit signal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The switch request failed; tuning parameters were not re-applied.
    #[error("core switch failed, timing configuration is inconsistent: {0}")]
    Switch(#[from] SwitchError),

    /// An exit signal arrived after the orchestrator already requested termination.
    #[error("exit signal delivered after the orchestrator terminated")]
    AlreadyTerminated,
}

/// Umbrella error for boot planning and the simulation run loop.
#[derive(Debug, Error)]
pub enum BootError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Firmware tree and kernel command line disagree.
    #[error(transparent)]
    InconsistentReservation(#[from] InconsistentReservationError),

    /// Device tree blob generation failed.
    #[error(transparent)]
    Fdt(#[from] FdtError),

    /// An exit handler failed.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// A resumed run was asked for firmware; the snapshot already carries the booted OS.
    #[error("checkpoint `{checkpoint}` exists; a resumed run boots without generating firmware")]
    NoFirmware {
        /// The snapshot directory the run resumes from.
        checkpoint: String,
    },

    /// An output file could not be written.
    #[error("cannot write `{path}`: {source}")]
    Write {
        /// Destination path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The boot plan could not be serialized.
    #[error("cannot serialize boot plan: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The external simulation engine reported a failure.
    #[error("simulation engine failure: {0}")]
    Engine(String),
}

impl From<SwitchError> for BootError {
    fn from(err: SwitchError) -> Self {
        Self::Orchestrator(OrchestratorError::Switch(err))
    }
}
