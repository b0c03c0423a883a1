//! # Switchable Processor Tests

use pimsim_core::common::SwitchError;
use pimsim_core::core::{CoreTunables, CoreVariant, Processor, SwitchableProcessor};
use pretty_assertions::assert_eq;

fn tuned(fetch_buffer_size: u32) -> CoreTunables {
    CoreTunables { fetch_buffer_size }
}

#[test]
fn test_cores_start_on_starting_model() {
    let processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 2);
    assert_eq!(processor.num_cores(), 2);
    assert_eq!(processor.variants(), vec![CoreVariant::Fast; 2]);
    assert!(!processor.is_switched());
    assert_eq!(processor.core_variant(2), None);
}

#[test]
fn test_switch_moves_every_core() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 4);
    processor.switch_cores().unwrap();
    assert!(processor.is_switched());
    assert_eq!(processor.variants(), vec![CoreVariant::Detailed; 4]);
}

#[test]
fn test_switch_discards_standby_tunables() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 1);
    processor.configure_standby(0, tuned(32)).unwrap();
    assert_eq!(processor.standby_tunables(0), Some(tuned(32)));
    processor.switch_cores().unwrap();
    assert_eq!(processor.standby_tunables(0), None);
    assert_eq!(processor.tunables(0), Some(CoreTunables::default()));
}

#[test]
fn test_standby_cannot_be_configured_after_switch() {
    let mut processor = SwitchableProcessor::new_switched(CoreVariant::Fast, CoreVariant::Detailed, 1);
    assert_eq!(
        processor.configure_standby(0, tuned(32)),
        Err(SwitchError::AlreadySwitched {
            core: 0,
            variant: CoreVariant::Detailed,
        })
    );
}

#[test]
fn test_standby_on_missing_core_is_rejected() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 1);
    assert_eq!(
        processor.configure_standby(7, tuned(32)),
        Err(SwitchError::Rejected("no core with index 7".to_string()))
    );
    assert_eq!(processor.standby_tunables(0), Some(CoreTunables::default()));
}

#[test]
fn test_second_switch_is_rejected() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 1);
    processor.switch_cores().unwrap();
    assert_eq!(
        processor.switch_cores(),
        Err(SwitchError::AlreadySwitched {
            core: 0,
            variant: CoreVariant::Detailed,
        })
    );
}

#[test]
fn test_switch_without_cores_is_rejected() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 0);
    assert_eq!(processor.switch_cores(), Err(SwitchError::NoCores));
}

#[test]
fn test_tunables_apply_to_active_model() {
    let mut processor = SwitchableProcessor::new(CoreVariant::Fast, CoreVariant::Detailed, 1);
    processor.apply_tunables(0, tuned(16)).unwrap();
    assert_eq!(processor.tunables(0), Some(tuned(16)));
    assert!(processor.apply_tunables(1, tuned(16)).is_err());
}
