//! Boot planning: everything decided before the guest runs.
//!
//! [`BootPlan::prepare`] performs the configuration-time sequence in order:
//! 1. **Validate:** Processor settings and the reservation policy.
//! 2. **Command line:** Base arguments plus `memmap=` exclusions derived from the policy.
//! 3. **Checkpoint:** Resolve the snapshot directory and pick fresh boot or resume.
//! 4. **Firmware:** On a fresh boot, generate and augment the device tree and cross-check it
//!    against the command line.
//!
//! Any failure here is fatal before a single guest instruction executes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::checkpoint::{CheckpointManager, CheckpointRef, StartMode};
use super::cmdline::{KernelCmdline, verify_exclusions, verify_reservations};
use super::orchestrator::BootOrchestrator;
use super::simulator::{Engine, ExitEvent, Simulator};
use crate::common::{BootError, ConfigError, FdtError, SwitchError};
use crate::config::{Config, ResumePolicy};
use crate::core::{CoreTunables, Processor, SwitchableProcessor};
use crate::soc::board::base_device_tree;
use crate::soc::fdt::{FdtNode, augment, blob};
use crate::soc::reservation::ReservationPolicy;

/// Workload inputs resolved against the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadPaths {
    /// Kernel image.
    pub kernel: PathBuf,
    /// Root disk image.
    pub disk_image: PathBuf,
    /// Bootloader image or resource name.
    pub bootloader: PathBuf,
    /// File made readable to the guest's boot script.
    pub readfile: Option<PathBuf>,
}

impl WorkloadPaths {
    fn from_config(config: &Config) -> Self {
        let workload = &config.workload;
        Self {
            kernel: config.resolve_path(&workload.kernel),
            disk_image: config.resolve_path(&workload.disk_image),
            bootloader: config.resolve_path(&workload.bootloader),
            readfile: workload.readfile.as_deref().map(|p| config.resolve_path(p)),
        }
    }
}

/// The validated inputs for one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct BootPlan {
    /// Fresh boot or resume.
    pub start: StartMode,
    /// The snapshot reference the start mode was derived from.
    pub checkpoint: CheckpointRef,
    /// Validated reservations.
    pub policy: ReservationPolicy,
    /// Kernel arguments.
    pub cmdline: KernelCmdline,
    /// Augmented firmware tree; `None` when resuming, since the snapshot carries the booted OS.
    pub firmware: Option<FdtNode>,
    /// Workload paths.
    pub workload: WorkloadPaths,
}

impl BootPlan {
    /// Prepares a run, generating the base device tree with `base_generator`.
    ///
    /// The generator receives the final command line so it can place it in `/chosen`.
    pub fn prepare<G>(config: &Config, base_generator: G) -> Result<Self, BootError>
    where
        G: FnOnce(&KernelCmdline) -> FdtNode,
    {
        config.processor.validate()?;
        let policy = ReservationPolicy::from_config(&config.memory)?;
        let cmdline = KernelCmdline::new(&config.workload.kernel_args, &policy);
        verify_exclusions(&policy, &cmdline)?;

        let checkpoint = CheckpointManager::resolve_config(config);
        let start = CheckpointManager::start_mode(&checkpoint);

        let firmware = match start {
            StartMode::Fresh => {
                let tree = augment(|| base_generator(&cmdline), policy.regions());
                if !tree.is_root() {
                    return Err(ConfigError::MalformedTree(format!(
                        "generator returned node `{}` instead of a root node",
                        tree.name()
                    ))
                    .into());
                }
                verify_reservations(&tree, &cmdline)?;
                Some(tree)
            }
            StartMode::Resume(ref path) => {
                info!(path = %path.display(), "resuming from checkpoint, skipping firmware generation");
                None
            }
        };

        info!(
            resume = start.is_resume(),
            reservations = policy.regions().len(),
            bootargs = %cmdline.to_bootargs(),
            "boot plan prepared"
        );

        Ok(Self {
            start,
            checkpoint,
            policy,
            cmdline,
            firmware,
            workload: WorkloadPaths::from_config(config),
        })
    }

    /// Prepares a run using the built-in board generator.
    pub fn prepare_default(config: &Config) -> Result<Self, BootError> {
        Self::prepare(config, |cmdline| {
            base_device_tree(config, &cmdline.to_bootargs())
        })
    }

    /// The flattened device tree, if the run boots fresh.
    pub fn dtb(&self) -> Result<Option<Vec<u8>>, FdtError> {
        self.firmware.as_ref().map(blob::to_dtb).transpose()
    }

    /// Flattens the firmware tree into `out` and returns the blob size.
    ///
    /// A resumed run has no firmware, so this fails with [`BootError::NoFirmware`].
    pub fn write_dtb(&self, out: &Path) -> Result<usize, BootError> {
        let blob = self.dtb()?.ok_or_else(|| BootError::NoFirmware {
            checkpoint: self.checkpoint.path.display().to_string(),
        })?;
        fs::write(out, &blob).map_err(|source| BootError::Write {
            path: out.display().to_string(),
            source,
        })?;
        info!(path = %out.display(), bytes = blob.len(), "wrote device tree blob");
        Ok(blob.len())
    }

    /// The plan as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, BootError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The orchestrator for this run.
    pub fn orchestrator(&self, config: &Config) -> BootOrchestrator {
        BootOrchestrator::from_config(config, &self.start)
    }

    /// A reference processor in the state the engine would construct for this run.
    ///
    /// Before the switch the standby models carry the configured tunables, as a board script
    /// would set them; the switch discards them and the orchestrator re-applies them.
    pub fn processor(&self, config: &Config) -> Result<SwitchableProcessor, SwitchError> {
        let p = &config.processor;
        let resumed_switched = self.start.is_resume()
            && config.checkpoint.resume_policy == ResumePolicy::Switched;
        if resumed_switched {
            return Ok(SwitchableProcessor::new_switched(
                p.starting_core,
                p.switch_core,
                p.num_cores,
            ));
        }
        let mut processor = SwitchableProcessor::new(p.starting_core, p.switch_core, p.num_cores);
        let tunables = CoreTunables {
            fetch_buffer_size: p.fetch_buffer_size,
        };
        for core in 0..processor.num_cores() {
            processor.configure_standby(core, tunables)?;
        }
        Ok(processor)
    }

    /// Wraps `engine` in a simulator with the orchestrator registered for guest exits.
    pub fn simulator<E: Engine>(&self, config: &Config, engine: E) -> Simulator<E> {
        Simulator::new(engine).on_exit_event(ExitEvent::Exit, Box::new(self.orchestrator(config)))
    }
}
