//! Configuration system for the PIM boot core.
//!
//! This module defines all configuration structures used to parameterize a boot. It provides:
//! 1. **Defaults:** Baseline board, memory map, reservation, and workload constants.
//! 2. **Structures:** Hierarchical config for general, board, memory, processor, workload, and checkpoint.
//! 3. **Enums:** Resume policy for snapshots.
//!
//! Configuration is supplied as JSON (see [`Config::from_json_str`] and [`Config::load`]) or
//! taken from `Config::default()`, which reproduces the reference PIM board. Board topology
//! values (clock, cache sizes, memory model) are opaque to this crate and passed through
//! to the simulation engine untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{AddrRange, ConfigError};
use crate::core::CoreVariant;

/// Default configuration constants.
///
/// These values describe the reference single-core ARM board with an HBM2 memory model and
/// a PIM device occupying two reserved windows above the kernel's usable memory.
mod defaults {
    /// Base address of main system RAM.
    pub const RAM_BASE: u64 = 0x8000_0000;

    /// Size of main system RAM (2 GiB).
    pub const RAM_SIZE: u64 = 2 * 1024 * 1024 * 1024;

    /// Base of the PIM configuration window.
    pub const PIM_CONFIG_BASE: u64 = 0xC000_0000;

    /// Size of the PIM configuration window (16 KiB).
    pub const PIM_CONFIG_SIZE: u64 = 0x4000;

    /// Base of the PIM data window, directly after the configuration window.
    pub const PIM_DATA_BASE: u64 = 0xC000_4000;

    /// Size of the PIM data window (256 MiB).
    pub const PIM_DATA_SIZE: u64 = 0x1000_0000;

    /// Board clock frequency.
    pub const CLK_FREQ: &str = "3GHz";

    /// Cache line size in bytes; HBM2 requires 32-byte lines.
    pub const CACHE_LINE_SIZE: u32 = 32;

    /// L1 data cache size.
    pub const L1D_SIZE: &str = "16kB";

    /// L1 instruction cache size.
    pub const L1I_SIZE: &str = "16kB";

    /// Private L2 cache size.
    pub const L2_SIZE: &str = "256kB";

    /// Main memory timing model.
    pub const MEMORY_MODEL: &str = "DRAMSysHBM2";

    /// Number of cores.
    pub const NUM_CORES: usize = 1;

    /// Fetch buffer width in bytes applied to the detailed core.
    pub const FETCH_BUFFER_SIZE: u32 = 32;

    /// Kernel image path, relative to the working directory.
    pub const KERNEL: &str = "pim_bridge_connector/gem5_kernel_image_5_15_36";

    /// Root disk image path, relative to the working directory.
    pub const DISK_IMAGE: &str = "pim_bridge_connector/arm-ubuntu-24.04-img";

    /// Bootloader resource name or path.
    pub const BOOTLOADER: &str = "arm64-bootloader-foundation";

    /// File handed to the guest's boot script (the PIM bridge kernel module).
    pub const READFILE: &str = "pim_bridge_connector/pim_bridge_module.ko";

    /// Snapshot directory consulted for resume.
    pub const CHECKPOINT_DIR: &str = "checkpoint_after_boot_kernel_5_15_36";

    /// Kernel arguments other than memory exclusions.
    pub const KERNEL_ARGS: [&str; 5] = [
        "console=ttyAMA0",
        "root=/dev/vda2",
        "rootfstype=ext4",
        "rw",
        "earlyprintk=serial,ttyAMA0",
    ];
}

/// Orchestrator starting state when resuming from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResumePolicy {
    /// The snapshot was taken before the switch; wait for the boot signal and switch again.
    #[default]
    AwaitSignal,
    /// The snapshot was taken after the switch; start already switched.
    Switched,
}

/// Root configuration structure containing all settings.
///
/// # Examples
///
/// ```
/// use pimsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.memory.ram_base, 0x8000_0000);
/// assert_eq!(config.memory.reserved.len(), 2);
/// assert_eq!(config.processor.fetch_buffer_size, 32);
/// ```
///
/// Deserializing from JSON; omitted sections take their defaults:
///
/// ```
/// use pimsim_core::config::Config;
/// use pimsim_core::core::CoreVariant;
///
/// let json = r#"{
///     "memory": {
///         "ram_base": 2147483648,
///         "ram_size": 1073741824,
///         "reserved": [
///             { "label": "pim", "base": 3221225472, "size": 65536, "exclude_in_cmdline": true }
///         ]
///     },
///     "processor": { "num_cores": 2, "starting_core": "Atomic", "switch_core": "O3" }
/// }"#;
///
/// let config = Config::from_json_str(json).unwrap();
/// assert_eq!(config.memory.reserved[0].label, "pim");
/// assert!(config.memory.reserved[0].no_map);
/// assert_eq!(config.processor.starting_core, CoreVariant::Fast);
/// assert_eq!(config.processor.switch_core, CoreVariant::Detailed);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Opaque board topology passed through to the engine
    #[serde(default)]
    pub board: BoardConfig,
    /// RAM window and PIM reservations
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Core counts, models, and tunables
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Guest kernel, disk, bootloader, and arguments
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Snapshot location and resume policy
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl Config {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e.into(),
        })?;
        Self::from_json_str(&text)
    }

    /// Resolves `relative` against the configured working directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        self.general.working_dir.join(relative)
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory all workload and checkpoint paths are relative to
    #[serde(default = "GeneralConfig::default_working_dir")]
    pub working_dir: PathBuf,
}

impl GeneralConfig {
    /// Returns the default working directory (the process's current directory).
    fn default_working_dir() -> PathBuf {
        PathBuf::from(".")
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            working_dir: Self::default_working_dir(),
        }
    }
}

/// Board topology. None of these values are interpreted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Core clock frequency
    #[serde(default = "BoardConfig::default_clk_freq")]
    pub clk_freq: String,

    /// Cache line size in bytes
    #[serde(default = "BoardConfig::default_cache_line_size")]
    pub cache_line_size: u32,

    /// L1 data cache size
    #[serde(default = "BoardConfig::default_l1d_size")]
    pub l1d_size: String,

    /// L1 instruction cache size
    #[serde(default = "BoardConfig::default_l1i_size")]
    pub l1i_size: String,

    /// L2 cache size
    #[serde(default = "BoardConfig::default_l2_size")]
    pub l2_size: String,

    /// Main memory timing model name
    #[serde(default = "BoardConfig::default_memory_model")]
    pub memory_model: String,
}

impl BoardConfig {
    fn default_clk_freq() -> String {
        defaults::CLK_FREQ.to_string()
    }

    fn default_cache_line_size() -> u32 {
        defaults::CACHE_LINE_SIZE
    }

    fn default_l1d_size() -> String {
        defaults::L1D_SIZE.to_string()
    }

    fn default_l1i_size() -> String {
        defaults::L1I_SIZE.to_string()
    }

    fn default_l2_size() -> String {
        defaults::L2_SIZE.to_string()
    }

    fn default_memory_model() -> String {
        defaults::MEMORY_MODEL.to_string()
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            clk_freq: Self::default_clk_freq(),
            cache_line_size: defaults::CACHE_LINE_SIZE,
            l1d_size: Self::default_l1d_size(),
            l1i_size: Self::default_l1i_size(),
            l2_size: Self::default_l2_size(),
            memory_model: Self::default_memory_model(),
        }
    }
}

/// Physical memory map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Main RAM base address
    #[serde(default = "MemoryConfig::default_ram_base")]
    pub ram_base: u64,

    /// Main RAM size in bytes
    #[serde(default = "MemoryConfig::default_ram_size")]
    pub ram_size: u64,

    /// Regions reserved for the PIM device
    #[serde(default = "MemoryConfig::default_reserved")]
    pub reserved: Vec<ReservedRegionConfig>,
}

impl MemoryConfig {
    /// Returns the default RAM base address.
    fn default_ram_base() -> u64 {
        defaults::RAM_BASE
    }

    /// Returns the default RAM size in bytes.
    fn default_ram_size() -> u64 {
        defaults::RAM_SIZE
    }

    /// Returns the PIM configuration and data windows.
    ///
    /// Only the data window is excluded on the kernel command line; the configuration window
    /// is kept out of the allocator by its `no-map` node alone.
    fn default_reserved() -> Vec<ReservedRegionConfig> {
        vec![
            ReservedRegionConfig {
                label: "pim_config".to_string(),
                base: defaults::PIM_CONFIG_BASE,
                size: defaults::PIM_CONFIG_SIZE,
                usable_by_os: false,
                no_map: true,
                exclude_in_cmdline: false,
            },
            ReservedRegionConfig {
                label: "pim_data".to_string(),
                base: defaults::PIM_DATA_BASE,
                size: defaults::PIM_DATA_SIZE,
                usable_by_os: false,
                no_map: true,
                exclude_in_cmdline: true,
            },
        ]
    }

    /// The physical RAM window.
    pub const fn ram_window(&self) -> AddrRange {
        AddrRange::new(self.ram_base, self.ram_size)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_base: defaults::RAM_BASE,
            ram_size: defaults::RAM_SIZE,
            reserved: Self::default_reserved(),
        }
    }
}

/// One reserved region as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedRegionConfig {
    /// Node label; the device tree node is named `<label>@<base>`
    pub label: String,

    /// Physical base address
    pub base: u64,

    /// Size in bytes
    pub size: u64,

    /// Whether the OS may allocate from the region
    #[serde(default)]
    pub usable_by_os: bool,

    /// Whether the OS must not map the region
    #[serde(default = "ReservedRegionConfig::default_no_map")]
    pub no_map: bool,

    /// Whether the region is also excluded with a `memmap=` kernel argument
    #[serde(default)]
    pub exclude_in_cmdline: bool,
}

impl ReservedRegionConfig {
    fn default_no_map() -> bool {
        true
    }
}

/// Processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of cores
    #[serde(default = "ProcessorConfig::default_num_cores")]
    pub num_cores: usize,

    /// Model the cores boot on
    #[serde(default = "ProcessorConfig::default_starting_core")]
    pub starting_core: CoreVariant,

    /// Model the cores switch to on the boot signal
    #[serde(default = "ProcessorConfig::default_switch_core")]
    pub switch_core: CoreVariant,

    /// Fetch buffer width in bytes applied to every core after the switch
    #[serde(default = "ProcessorConfig::default_fetch_buffer_size")]
    pub fetch_buffer_size: u32,
}

impl ProcessorConfig {
    fn default_num_cores() -> usize {
        defaults::NUM_CORES
    }

    fn default_starting_core() -> CoreVariant {
        CoreVariant::Fast
    }

    fn default_switch_core() -> CoreVariant {
        CoreVariant::Detailed
    }

    fn default_fetch_buffer_size() -> u32 {
        defaults::FETCH_BUFFER_SIZE
    }

    /// Checks that there is at least one core and that the switch changes the model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cores == 0 {
            return Err(ConfigError::NoCores);
        }
        if self.starting_core == self.switch_core {
            return Err(ConfigError::IdenticalVariants(self.starting_core));
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            num_cores: defaults::NUM_CORES,
            starting_core: CoreVariant::Fast,
            switch_core: CoreVariant::Detailed,
            fetch_buffer_size: defaults::FETCH_BUFFER_SIZE,
        }
    }
}

/// Guest workload inputs. Paths are opaque and relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Kernel image
    #[serde(default = "WorkloadConfig::default_kernel")]
    pub kernel: String,

    /// Root disk image
    #[serde(default = "WorkloadConfig::default_disk_image")]
    pub disk_image: String,

    /// Bootloader image or resource name
    #[serde(default = "WorkloadConfig::default_bootloader")]
    pub bootloader: String,

    /// File made readable to the guest's boot script
    #[serde(default = "WorkloadConfig::default_readfile")]
    pub readfile: Option<String>,

    /// Kernel arguments, without memory exclusions
    #[serde(default = "WorkloadConfig::default_kernel_args")]
    pub kernel_args: Vec<String>,
}

impl WorkloadConfig {
    fn default_kernel() -> String {
        defaults::KERNEL.to_string()
    }

    fn default_disk_image() -> String {
        defaults::DISK_IMAGE.to_string()
    }

    fn default_bootloader() -> String {
        defaults::BOOTLOADER.to_string()
    }

    fn default_readfile() -> Option<String> {
        Some(defaults::READFILE.to_string())
    }

    fn default_kernel_args() -> Vec<String> {
        defaults::KERNEL_ARGS.iter().map(ToString::to_string).collect()
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            kernel: Self::default_kernel(),
            disk_image: Self::default_disk_image(),
            bootloader: Self::default_bootloader(),
            readfile: Self::default_readfile(),
            kernel_args: Self::default_kernel_args(),
        }
    }
}

/// Snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Snapshot directory, relative to the working directory
    #[serde(default = "CheckpointConfig::default_dir")]
    pub dir: String,

    /// Orchestrator starting state when the snapshot is used
    #[serde(default)]
    pub resume_policy: ResumePolicy,
}

impl CheckpointConfig {
    fn default_dir() -> String {
        defaults::CHECKPOINT_DIR.to_string()
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            resume_policy: ResumePolicy::default(),
        }
    }
}
