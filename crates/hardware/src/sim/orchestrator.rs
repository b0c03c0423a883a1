//! Boot orchestration state machine.
//!
//! The guest boots on the fast core model; once its startup script raises the exit signal,
//! the orchestrator switches every core to the detailed model and re-applies the configured
//! tunables. The next exit signal ends the simulation.
//!
//! ```text
//!   AwaitingBootSignal --signal / switch, retune--> Switched --signal--> Terminated
//! ```
//!
//! Each call to [`BootOrchestrator::on_exit`] performs exactly one transition; the state
//! persists between calls. A failed switch is fatal: the orchestrator moves to `Terminated`
//! without touching any tunables, and the error aborts the run loop.

use serde::Serialize;
use tracing::{error, info, warn};

use super::checkpoint::StartMode;
use super::simulator::{ExitDecision, ExitHandler};
use crate::common::{OrchestratorError, SwitchError};
use crate::config::{Config, ResumePolicy};
use crate::core::{CoreTunables, CoreVariant, Processor};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    /// Running the starting model, waiting for the guest's boot signal.
    AwaitingBootSignal,
    /// Running the switch model.
    Switched,
    /// Termination has been requested.
    Terminated,
}

/// Drives the one-time fast→detailed switch.
#[derive(Debug, Clone)]
pub struct BootOrchestrator {
    state: OrchestratorState,
    switch_to: CoreVariant,
    tunables: CoreTunables,
}

impl BootOrchestrator {
    /// Creates an orchestrator for a fresh boot.
    pub const fn new(switch_to: CoreVariant, tunables: CoreTunables) -> Self {
        Self {
            state: OrchestratorState::AwaitingBootSignal,
            switch_to,
            tunables,
        }
    }

    /// Creates an orchestrator for a run restored from a snapshot.
    ///
    /// With [`ResumePolicy::Switched`] the snapshot is assumed to have been taken after the
    /// switch, so the orchestrator starts in `Switched` and the next signal stops the run.
    pub const fn resumed(switch_to: CoreVariant, tunables: CoreTunables, policy: ResumePolicy) -> Self {
        let state = match policy {
            ResumePolicy::AwaitSignal => OrchestratorState::AwaitingBootSignal,
            ResumePolicy::Switched => OrchestratorState::Switched,
        };
        Self {
            state,
            switch_to,
            tunables,
        }
    }

    /// Creates the orchestrator matching `config` and the engine's start mode.
    pub fn from_config(config: &Config, start: &StartMode) -> Self {
        let tunables = CoreTunables {
            fetch_buffer_size: config.processor.fetch_buffer_size,
        };
        let switch_to = config.processor.switch_core;
        match start {
            StartMode::Fresh => Self::new(switch_to, tunables),
            StartMode::Resume(_) => Self::resumed(switch_to, tunables, config.checkpoint.resume_policy),
        }
    }

    /// Current state.
    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Tunables applied to every core after the switch.
    pub const fn tunables(&self) -> CoreTunables {
        self.tunables
    }

    /// Handles one exit signal and returns whether the simulation should keep running.
    pub fn handle_signal(
        &mut self,
        processor: &mut dyn Processor,
    ) -> Result<ExitDecision, OrchestratorError> {
        match self.state {
            OrchestratorState::AwaitingBootSignal => {
                if let Err(err) = self.switch(processor) {
                    error!(error = %err, "core switch failed, aborting");
                    self.state = OrchestratorState::Terminated;
                    return Err(err.into());
                }
                self.state = OrchestratorState::Switched;
                info!(variant = %self.switch_to, "switched cores, continuing simulation");
                Ok(ExitDecision::Continue)
            }
            OrchestratorState::Switched => {
                self.state = OrchestratorState::Terminated;
                info!("exit signal after switch, stopping simulation");
                Ok(ExitDecision::Stop)
            }
            OrchestratorState::Terminated => {
                warn!("exit signal delivered after termination");
                Err(OrchestratorError::AlreadyTerminated)
            }
        }
    }

    fn switch(&self, processor: &mut dyn Processor) -> Result<(), SwitchError> {
        for (core, variant) in processor.variants().into_iter().enumerate() {
            info!(core, %variant, "core model before switch");
        }

        processor.switch_cores()?;

        // Switching may rebuild the core objects, so the tunables go onto the new model.
        for core in 0..processor.num_cores() {
            self.retune(processor, core)?;
        }
        Ok(())
    }

    fn retune(&self, processor: &mut dyn Processor, core: usize) -> Result<(), SwitchError> {
        let found = processor
            .core_variant(core)
            .ok_or_else(|| SwitchError::Rejected(format!("core {core} disappeared during switch")))?;
        if found != self.switch_to {
            return Err(SwitchError::Incomplete {
                core,
                expected: self.switch_to,
                found,
            });
        }
        processor.apply_tunables(core, self.tunables)?;
        info!(core, variant = %found, fetch_buffer_size = self.tunables.fetch_buffer_size, "core model after switch");
        Ok(())
    }
}

impl ExitHandler for BootOrchestrator {
    /// A run restored after the switch still needs its tunables; the snapshot does not
    /// carry them.
    fn on_start(&mut self, processor: &mut dyn Processor) -> Result<(), OrchestratorError> {
        if self.state == OrchestratorState::Switched {
            for core in 0..processor.num_cores() {
                self.retune(processor, core)?;
            }
        }
        Ok(())
    }

    fn on_exit(&mut self, processor: &mut dyn Processor) -> Result<ExitDecision, OrchestratorError> {
        self.handle_signal(processor)
    }
}
