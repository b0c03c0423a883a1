//! Boot orchestration and the host run loop.
//!
//! Provides the configuration-time boot plan (command line, checkpoint decision, firmware),
//! the exit-signal state machine that switches core models, and the loop that drives an
//! external engine.

/// Snapshot resolution and start mode.
pub mod checkpoint;

/// Kernel command line and reservation cross-checks.
pub mod cmdline;

/// Fast→detailed switch state machine.
pub mod orchestrator;

/// Configuration-time boot planning.
pub mod plan;

/// Engine run loop and exit handler dispatch.
pub mod simulator;

pub use checkpoint::{CheckpointManager, CheckpointRef, StartMode};
pub use cmdline::KernelCmdline;
pub use orchestrator::{BootOrchestrator, OrchestratorState};
pub use plan::BootPlan;
pub use simulator::{Engine, EngineExit, ExitDecision, ExitEvent, ExitHandler, RunOutcome, Simulator};
