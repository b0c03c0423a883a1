//! # Run Loop Tests
//!
//! The simulator runs the engine, dispatches each exit signal to its registered handler,
//! and stops on the first `Stop`, unhandled signal, halt, or error.

use std::cell::RefCell;
use std::rc::Rc;

use pimsim_core::common::{BootError, OrchestratorError};
use pimsim_core::core::{CoreTunables, CoreVariant, Processor};
use pimsim_core::sim::{
    BootOrchestrator, EngineExit, ExitDecision, ExitEvent, ExitHandler, RunOutcome, Simulator,
};
use pretty_assertions::assert_eq;

use crate::common::harness::{ScriptedEngine, init_tracing};

const TUNED: CoreTunables = CoreTunables {
    fetch_buffer_size: 32,
};

/// Handler that records each call and replays scripted decisions.
struct Recorder {
    calls: Rc<RefCell<Vec<&'static str>>>,
    decisions: Vec<ExitDecision>,
}

impl ExitHandler for Recorder {
    fn on_start(&mut self, _processor: &mut dyn Processor) -> Result<(), OrchestratorError> {
        self.calls.borrow_mut().push("start");
        Ok(())
    }

    fn on_exit(&mut self, _processor: &mut dyn Processor) -> Result<ExitDecision, OrchestratorError> {
        self.calls.borrow_mut().push("exit");
        Ok(if self.decisions.is_empty() {
            ExitDecision::Stop
        } else {
            self.decisions.remove(0)
        })
    }
}

#[test]
fn test_orchestrated_run_switches_once_and_stops() {
    init_tracing();
    let mut sim = Simulator::new(ScriptedEngine::exits(2, 3))
        .on_exit_event(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)));

    let summary = sim.run().unwrap();
    assert_eq!(summary.signals, 2);
    assert_eq!(summary.outcome, RunOutcome::Stopped(ExitEvent::Exit));

    let engine = sim.into_engine();
    assert_eq!(
        engine.observed,
        vec![vec![CoreVariant::Fast; 2], vec![CoreVariant::Detailed; 2]]
    );
    assert_eq!(engine.processor.tunables(1), Some(TUNED));
    assert_eq!(engine.script.len(), 1);
}

#[test]
fn test_unhandled_signal_stops_the_run() {
    let engine = ScriptedEngine::new(
        ScriptedEngine::exits(1, 0).processor,
        [EngineExit::Signal(ExitEvent::WorkBegin)],
    );
    let mut sim = Simulator::new(engine)
        .on_exit_event(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)));

    let summary = sim.run().unwrap();
    assert_eq!(summary.signals, 1);
    assert_eq!(summary.outcome, RunOutcome::Stopped(ExitEvent::WorkBegin));
    assert_eq!(sim.engine().processor.variants(), vec![CoreVariant::Fast]);
}

#[test]
fn test_halt_ends_the_run() {
    let engine = ScriptedEngine::new(
        ScriptedEngine::exits(1, 0).processor,
        [EngineExit::Signal(ExitEvent::Exit), EngineExit::Halted(3)],
    );
    let mut sim = Simulator::new(engine)
        .on_exit_event(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)));

    let summary = sim.run().unwrap();
    assert_eq!(summary.signals, 1);
    assert_eq!(summary.outcome, RunOutcome::Halted(3));
}

#[test]
fn test_handler_lifecycle_order() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let recorder = Recorder {
        calls: Rc::clone(&calls),
        decisions: vec![ExitDecision::Continue, ExitDecision::Continue],
    };
    let engine = ScriptedEngine::new(
        ScriptedEngine::exits(1, 0).processor,
        [EngineExit::Signal(ExitEvent::Checkpoint); 3],
    );
    let mut sim = Simulator::new(engine).on_exit_event(ExitEvent::Checkpoint, Box::new(recorder));

    let summary = sim.run().unwrap();
    assert_eq!(summary.signals, 3);
    assert_eq!(*calls.borrow(), vec!["start", "exit", "exit", "exit"]);
}

#[test]
fn test_engine_failure_propagates() {
    let mut sim = Simulator::new(ScriptedEngine::exits(1, 1))
        .on_exit_event(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)));

    let err = sim.run().unwrap_err();
    assert!(matches!(err, BootError::Engine(_)), "{err}");
}

#[test]
fn test_switch_failure_aborts_the_loop() {
    let engine = ScriptedEngine::new(
        pimsim_core::core::SwitchableProcessor::new_switched(
            CoreVariant::Fast,
            CoreVariant::Detailed,
            1,
        ),
        [EngineExit::Signal(ExitEvent::Exit); 2],
    );
    let mut sim = Simulator::new(engine)
        .on_exit_event(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)));

    let err = sim.run().unwrap_err();
    assert!(
        matches!(err, BootError::Orchestrator(OrchestratorError::Switch(_))),
        "{err}"
    );
    assert_eq!(sim.engine().script.len(), 1);
}

#[test]
fn test_register_replaces_previous_handler() {
    let mut sim = Simulator::new(ScriptedEngine::exits(1, 0));
    assert!(
        sim.register(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)))
            .is_none()
    );
    assert!(
        sim.register(ExitEvent::Exit, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)))
            .is_some()
    );
    let _ = sim.register(ExitEvent::WorkEnd, Box::new(BootOrchestrator::new(CoreVariant::Detailed, TUNED)));
    assert_eq!(sim.registered_events(), vec![ExitEvent::Exit, ExitEvent::WorkEnd]);
}
