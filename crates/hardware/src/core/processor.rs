//! Processor abstraction with switchable core models.
//!
//! The simulation engine owns the processor; the boot orchestrator only borrows it while
//! the guest is paused at an exit signal. This module provides:
//! 1. **`CoreVariant`:** The fast functional and detailed timing core models.
//! 2. **`CoreTunables`:** Per-core microarchitectural parameters of the active model.
//! 3. **`Processor`:** The seam between the orchestrator and whatever engine runs the cores.
//! 4. **`SwitchableProcessor`:** A reference implementation that keeps one core object per
//!    model and rebuilds the destination core on a switch.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::SwitchError;

/// Default fetch buffer width in bytes of a freshly constructed core.
pub const DEFAULT_FETCH_BUFFER_SIZE: u32 = 64;

/// Core model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CoreVariant {
    /// Functional model used to boot the OS quickly.
    #[default]
    #[serde(alias = "Atomic")]
    Fast,
    /// Cycle-level timing model used once the workload starts.
    #[serde(alias = "O3")]
    Detailed,
}

impl fmt::Display for CoreVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "Fast"),
            Self::Detailed => write!(f, "Detailed"),
        }
    }
}

/// Microarchitectural parameters of one core model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreTunables {
    /// Fetch buffer width in bytes.
    pub fetch_buffer_size: u32,
}

impl Default for CoreTunables {
    fn default() -> Self {
        Self {
            fetch_buffer_size: DEFAULT_FETCH_BUFFER_SIZE,
        }
    }
}

/// Handle to the processor used by exit handlers.
///
/// Indices passed to the per-core methods are in `0..num_cores()`.
pub trait Processor {
    /// Number of cores.
    fn num_cores(&self) -> usize;

    /// Active model of core `core`, or `None` if the index is out of range.
    fn core_variant(&self, core: usize) -> Option<CoreVariant>;

    /// Switches every core to the processor's switch model.
    ///
    /// Switching may rebuild core objects; tunables set before the call must not be assumed
    /// to survive it.
    fn switch_cores(&mut self) -> Result<(), SwitchError>;

    /// Tunables of the active model of core `core`.
    fn tunables(&self, core: usize) -> Option<CoreTunables>;

    /// Applies `tunables` to the active model of core `core`.
    fn apply_tunables(&mut self, core: usize, tunables: CoreTunables) -> Result<(), SwitchError>;

    /// Active model of every core, in index order.
    fn variants(&self) -> Vec<CoreVariant> {
        (0..self.num_cores())
            .filter_map(|core| self.core_variant(core))
            .collect()
    }
}

/// One instantiated core model.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelInstance {
    variant: CoreVariant,
    tunables: CoreTunables,
}

impl ModelInstance {
    fn new(variant: CoreVariant) -> Self {
        Self {
            variant,
            tunables: CoreTunables::default(),
        }
    }
}

/// The starting and switch model objects backing a single core.
#[derive(Debug, Clone)]
struct CoreSlot {
    starting: ModelInstance,
    switched: ModelInstance,
}

/// A processor whose cores start on one model and switch once to another.
#[derive(Debug, Clone)]
pub struct SwitchableProcessor {
    starting: CoreVariant,
    switch_to: CoreVariant,
    switched: bool,
    slots: Vec<CoreSlot>,
}

impl SwitchableProcessor {
    /// Creates a processor with `num_cores` cores running `starting`, switchable to `switch_to`.
    pub fn new(starting: CoreVariant, switch_to: CoreVariant, num_cores: usize) -> Self {
        let slots = (0..num_cores)
            .map(|_| CoreSlot {
                starting: ModelInstance::new(starting),
                switched: ModelInstance::new(switch_to),
            })
            .collect();
        Self {
            starting,
            switch_to,
            switched: false,
            slots,
        }
    }

    /// Creates a processor that is already running its switch model.
    ///
    /// Used when the engine restores a snapshot taken after the switch.
    pub fn new_switched(starting: CoreVariant, switch_to: CoreVariant, num_cores: usize) -> Self {
        let mut processor = Self::new(starting, switch_to, num_cores);
        processor.switched = true;
        processor
    }

    /// The model the cores boot on.
    pub const fn starting_variant(&self) -> CoreVariant {
        self.starting
    }

    /// The model the cores switch to.
    pub const fn switch_variant(&self) -> CoreVariant {
        self.switch_to
    }

    /// Returns `true` once the cores run the switch model.
    pub const fn is_switched(&self) -> bool {
        self.switched
    }

    /// Sets tunables on the not-yet-active switch model of core `core`.
    ///
    /// The switch rebuilds that model, so these values are discarded; this mirrors how a
    /// board script configures the standby core before the simulation starts. Fails once the
    /// cores have switched, since the standby model is then the active one.
    pub fn configure_standby(&mut self, core: usize, tunables: CoreTunables) -> Result<(), SwitchError> {
        if self.switched {
            return Err(SwitchError::AlreadySwitched {
                core,
                variant: self.switch_to,
            });
        }
        let slot = self
            .slots
            .get_mut(core)
            .ok_or_else(|| SwitchError::Rejected(format!("no core with index {core}")))?;
        slot.switched.tunables = tunables;
        Ok(())
    }

    /// Tunables of the standby model of core `core`, or `None` once switched.
    pub fn standby_tunables(&self, core: usize) -> Option<CoreTunables> {
        if self.switched {
            return None;
        }
        self.slots.get(core).map(|slot| slot.switched.tunables)
    }

    fn active(&self, core: usize) -> Option<&ModelInstance> {
        let slot = self.slots.get(core)?;
        Some(if self.switched {
            &slot.switched
        } else {
            &slot.starting
        })
    }

    fn active_mut(&mut self, core: usize) -> Option<&mut ModelInstance> {
        let switched = self.switched;
        let slot = self.slots.get_mut(core)?;
        Some(if switched {
            &mut slot.switched
        } else {
            &mut slot.starting
        })
    }
}

impl Processor for SwitchableProcessor {
    fn num_cores(&self) -> usize {
        self.slots.len()
    }

    fn core_variant(&self, core: usize) -> Option<CoreVariant> {
        self.active(core).map(|model| model.variant)
    }

    fn switch_cores(&mut self) -> Result<(), SwitchError> {
        if self.slots.is_empty() {
            return Err(SwitchError::NoCores);
        }
        if self.switched {
            return Err(SwitchError::AlreadySwitched {
                core: 0,
                variant: self.switch_to,
            });
        }
        for (core, slot) in self.slots.iter_mut().enumerate() {
            slot.switched = ModelInstance::new(self.switch_to);
            debug!(core, from = %self.starting, to = %self.switch_to, "rebuilt core model");
        }
        self.switched = true;
        Ok(())
    }

    fn tunables(&self, core: usize) -> Option<CoreTunables> {
        self.active(core).map(|model| model.tunables)
    }

    fn apply_tunables(&mut self, core: usize, tunables: CoreTunables) -> Result<(), SwitchError> {
        let model = self
            .active_mut(core)
            .ok_or_else(|| SwitchError::Rejected(format!("no core with index {core}")))?;
        model.tunables = tunables;
        Ok(())
    }
}
