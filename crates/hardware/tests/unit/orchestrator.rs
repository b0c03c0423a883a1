//! # Boot Orchestrator Tests
//!
//! The orchestrator performs exactly one transition per exit signal. These tests drive
//! it with a mock processor to check the order of calls during the switch, and with the
//! reference processor to check the resulting core state.

use std::path::PathBuf;

use mockall::Sequence;
use mockall::predicate::{always, eq};
use pimsim_core::common::{OrchestratorError, SwitchError};
use pimsim_core::config::{Config, ResumePolicy};
use pimsim_core::core::{CoreTunables, CoreVariant, Processor, SwitchableProcessor};
use pimsim_core::sim::{BootOrchestrator, ExitDecision, ExitHandler, OrchestratorState, StartMode};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::init_tracing;
use crate::common::mocks::MockCores;

const TUNED: CoreTunables = CoreTunables {
    fetch_buffer_size: 32,
};

fn orchestrator() -> BootOrchestrator {
    BootOrchestrator::new(CoreVariant::Detailed, TUNED)
}

#[rstest]
fn test_first_signal_switches_then_tunes_every_core(#[values(1, 2, 4)] num_cores: usize) {
    init_tracing();
    let mut seq = Sequence::new();
    let mut cores = MockCores::with_cores(num_cores, CoreVariant::Detailed);
    let _ = cores
        .expect_switch_cores()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    for core in 0..num_cores {
        let _ = cores
            .expect_apply_tunables()
            .with(eq(core), eq(TUNED))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
    }

    let mut orch = orchestrator();
    assert_eq!(orch.handle_signal(&mut cores), Ok(ExitDecision::Continue));
    assert_eq!(orch.state(), OrchestratorState::Switched);
}

#[test]
fn test_second_signal_stops_without_switching() {
    let mut cores = MockCores::with_cores(1, CoreVariant::Detailed);
    let _ = cores.expect_switch_cores().times(1).returning(|| Ok(()));
    let _ = cores
        .expect_apply_tunables()
        .times(1)
        .returning(|_, _| Ok(()));

    let mut orch = orchestrator();
    assert_eq!(orch.handle_signal(&mut cores), Ok(ExitDecision::Continue));
    assert_eq!(orch.handle_signal(&mut cores), Ok(ExitDecision::Stop));
    assert_eq!(orch.state(), OrchestratorState::Terminated);
}

#[test]
fn test_failed_switch_aborts_without_tuning() {
    init_tracing();
    let mut cores = MockCores::with_cores(2, CoreVariant::Fast);
    let _ = cores
        .expect_switch_cores()
        .times(1)
        .returning(|| Err(SwitchError::Rejected("model not instantiated".to_string())));
    let _ = cores.expect_apply_tunables().times(0);

    let mut orch = orchestrator();
    assert_eq!(
        orch.handle_signal(&mut cores),
        Err(OrchestratorError::Switch(SwitchError::Rejected(
            "model not instantiated".to_string()
        )))
    );
    assert_eq!(orch.state(), OrchestratorState::Terminated);
}

#[test]
fn test_core_left_on_old_model_is_incomplete() {
    let mut cores = MockCores::with_cores(1, CoreVariant::Fast);
    let _ = cores.expect_switch_cores().times(1).returning(|| Ok(()));
    let _ = cores.expect_apply_tunables().times(0);

    let mut orch = orchestrator();
    assert_eq!(
        orch.handle_signal(&mut cores),
        Err(OrchestratorError::Switch(SwitchError::Incomplete {
            core: 0,
            expected: CoreVariant::Detailed,
            found: CoreVariant::Fast,
        }))
    );
    assert_eq!(orch.state(), OrchestratorState::Terminated);
}

#[test]
fn test_signal_after_termination_is_an_error() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 1);
    let mut orch = orchestrator();
    assert_eq!(orch.handle_signal(&mut processor), Ok(ExitDecision::Continue));
    assert_eq!(orch.handle_signal(&mut processor), Ok(ExitDecision::Stop));
    assert_eq!(
        orch.handle_signal(&mut processor),
        Err(OrchestratorError::AlreadyTerminated)
    );
    assert_eq!(orch.state(), OrchestratorState::Terminated);
}

#[test]
fn test_tunables_survive_the_rebuild() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 2);
    for core in 0..2 {
        processor.configure_standby(core, TUNED).unwrap();
    }

    let mut orch = orchestrator();
    assert_eq!(orch.on_exit(&mut processor), Ok(ExitDecision::Continue));
    assert_eq!(processor.variants(), vec![CoreVariant::Detailed; 2]);
    assert_eq!(processor.tunables(0), Some(TUNED));
    assert_eq!(processor.tunables(1), Some(TUNED));
}

#[test]
fn test_on_start_is_a_no_op_before_switch() {
    let mut cores = MockCores::new();
    let _ = cores.expect_num_cores().times(0);
    let _ = cores.expect_apply_tunables().times(0);
    assert_eq!(orchestrator().on_start(&mut cores), Ok(()));
}

#[test]
fn test_resumed_switched_retunes_on_start_and_stops_on_first_signal() {
    let mut processor =
        SwitchableProcessor::new_switched(CoreVariant::Fast, CoreVariant::Detailed, 1);
    let mut orch = BootOrchestrator::resumed(CoreVariant::Detailed, TUNED, ResumePolicy::Switched);
    assert_eq!(orch.state(), OrchestratorState::Switched);

    orch.on_start(&mut processor).unwrap();
    assert_eq!(processor.tunables(0), Some(TUNED));
    assert_eq!(orch.on_exit(&mut processor), Ok(ExitDecision::Stop));
}

#[test]
fn test_resumed_awaiting_signal_switches_again() {
    let mut cores = MockCores::with_cores(1, CoreVariant::Detailed);
    let _ = cores.expect_switch_cores().times(1).returning(|| Ok(()));
    let _ = cores
        .expect_apply_tunables()
        .with(eq(0), always())
        .times(1)
        .returning(|_, _| Ok(()));

    let mut orch =
        BootOrchestrator::resumed(CoreVariant::Detailed, TUNED, ResumePolicy::AwaitSignal);
    assert_eq!(orch.state(), OrchestratorState::AwaitingBootSignal);
    assert_eq!(orch.on_exit(&mut cores), Ok(ExitDecision::Continue));
}

#[rstest]
#[case::fresh(StartMode::Fresh, ResumePolicy::Switched, OrchestratorState::AwaitingBootSignal)]
#[case::resume_await(StartMode::Resume(PathBuf::from("cpt")), ResumePolicy::AwaitSignal, OrchestratorState::AwaitingBootSignal)]
#[case::resume_switched(StartMode::Resume(PathBuf::from("cpt")), ResumePolicy::Switched, OrchestratorState::Switched)]
fn test_from_config_initial_state(
    #[case] start: StartMode,
    #[case] policy: ResumePolicy,
    #[case] expected: OrchestratorState,
) {
    let mut config = Config::default();
    config.checkpoint.resume_policy = policy;
    config.processor.fetch_buffer_size = 48;

    let orch = BootOrchestrator::from_config(&config, &start);
    assert_eq!(orch.state(), expected);
    assert_eq!(orch.tunables(), CoreTunables { fetch_buffer_size: 48 });
}
