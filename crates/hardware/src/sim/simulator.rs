//! Simulation host run loop.
//!
//! The [`Simulator`] owns the external engine side-by-side with the exit handlers, so a handler
//! can borrow the engine's processor while the guest is paused. The loop is single-threaded:
//! run the engine until it reports an exit signal or a halt, dispatch the signal to the
//! registered handler, and either resume or stop according to the handler's decision.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::{BootError, OrchestratorError};
use crate::core::Processor;

/// Kinds of exit signals the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ExitEvent {
    /// The guest requested an exit (e.g. `m5 exit` from the startup script).
    Exit,
    /// The guest requested a checkpoint.
    Checkpoint,
    /// The guest reported a failure.
    Fail,
    /// A region of interest began.
    WorkBegin,
    /// A region of interest ended.
    WorkEnd,
    /// The engine reached its tick limit.
    MaxTick,
    /// The user interrupted the engine.
    UserInterrupt,
}

/// What the engine's `run` call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineExit {
    /// The engine paused on an exit signal.
    Signal(ExitEvent),
    /// The guest halted on its own with the given code.
    Halted(i32),
}

/// Decision returned by an exit handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitDecision {
    /// Resume the guest.
    Continue,
    /// End the simulation.
    Stop,
}

/// The external simulation engine.
pub trait Engine {
    /// Runs the guest until an exit signal or halt. Blocks for as long as the guest runs.
    fn run(&mut self) -> Result<EngineExit, BootError>;

    /// The processor, for handlers to mutate while the guest is paused.
    fn processor_mut(&mut self) -> &mut dyn Processor;
}

/// Reacts to exit signals of one kind.
pub trait ExitHandler {
    /// Called once before the engine first runs.
    fn on_start(&mut self, _processor: &mut dyn Processor) -> Result<(), OrchestratorError> {
        Ok(())
    }

    /// Called each time the registered signal fires.
    fn on_exit(&mut self, processor: &mut dyn Processor) -> Result<ExitDecision, OrchestratorError>;
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// A handler (or the absence of one) stopped the run on this signal.
    Stopped(ExitEvent),
    /// The guest halted.
    Halted(i32),
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Number of exit signals observed.
    pub signals: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
}

/// Top-level host: engine plus exit handlers.
pub struct Simulator<E: Engine> {
    engine: E,
    handlers: BTreeMap<ExitEvent, Box<dyn ExitHandler>>,
}

impl<E: Engine> Simulator<E> {
    /// Creates a simulator with no handlers registered.
    pub const fn new(engine: E) -> Self {
        Self {
            engine,
            handlers: BTreeMap::new(),
        }
    }

    /// Registers `handler` for `event`, replacing and returning any previous one.
    pub fn register(
        &mut self,
        event: ExitEvent,
        handler: Box<dyn ExitHandler>,
    ) -> Option<Box<dyn ExitHandler>> {
        self.handlers.insert(event, handler)
    }

    /// Builder form of [`Simulator::register`].
    #[must_use]
    pub fn on_exit_event(mut self, event: ExitEvent, handler: Box<dyn ExitHandler>) -> Self {
        drop(self.register(event, handler));
        self
    }

    /// Events with a registered handler.
    pub fn registered_events(&self) -> Vec<ExitEvent> {
        self.handlers.keys().copied().collect()
    }

    /// The engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Consumes the simulator and returns the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Runs until a handler stops the run, an unhandled signal fires, or the guest halts.
    ///
    /// Handler and engine failures abort the loop immediately.
    pub fn run(&mut self) -> Result<RunSummary, BootError> {
        for handler in self.handlers.values_mut() {
            handler.on_start(self.engine.processor_mut())?;
        }

        let mut signals = 0;
        loop {
            let exit = self.engine.run()?;
            let event = match exit {
                EngineExit::Halted(code) => {
                    info!(code, signals, "guest halted");
                    return Ok(RunSummary {
                        signals,
                        outcome: RunOutcome::Halted(code),
                    });
                }
                EngineExit::Signal(event) => event,
            };
            signals += 1;

            let Some(handler) = self.handlers.get_mut(&event) else {
                warn!(?event, "no handler registered, stopping");
                return Ok(RunSummary {
                    signals,
                    outcome: RunOutcome::Stopped(event),
                });
            };

            match handler.on_exit(self.engine.processor_mut())? {
                ExitDecision::Continue => debug!(?event, "handler resumed the guest"),
                ExitDecision::Stop => {
                    info!(?event, signals, "handler stopped the simulation");
                    return Ok(RunSummary {
                        signals,
                        outcome: RunOutcome::Stopped(event),
                    });
                }
            }
        }
    }
}

impl<E: Engine + fmt::Debug> fmt::Debug for Simulator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("engine", &self.engine)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
