//! # Configuration Tests
//!
//! Tests for configuration structures, deserialization, defaults, and validation.

use std::io::Write;
use std::path::PathBuf;

use pimsim_core::common::{ConfigError, IoFailure};
use pimsim_core::config::*;
use pimsim_core::core::CoreVariant;
use pretty_assertions::assert_eq;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.general.working_dir, PathBuf::from("."));
    assert_eq!(config.memory.ram_base, 0x8000_0000);
    assert_eq!(config.memory.ram_size, 0x8000_0000);
    assert_eq!(config.processor.num_cores, 1);
    assert_eq!(config.checkpoint.resume_policy, ResumePolicy::AwaitSignal);
}

#[test]
fn test_memory_config_default_reservations() {
    let memory = MemoryConfig::default();
    assert_eq!(
        memory.reserved,
        vec![
            ReservedRegionConfig {
                label: "pim_config".to_string(),
                base: 0xC000_0000,
                size: 0x4000,
                usable_by_os: false,
                no_map: true,
                exclude_in_cmdline: false,
            },
            ReservedRegionConfig {
                label: "pim_data".to_string(),
                base: 0xC000_4000,
                size: 0x1000_0000,
                usable_by_os: false,
                no_map: true,
                exclude_in_cmdline: true,
            },
        ]
    );
}

#[test]
fn test_board_config_defaults() {
    let board = BoardConfig::default();
    assert_eq!(board.clk_freq, "3GHz");
    assert_eq!(board.cache_line_size, 32);
    assert_eq!(board.l1d_size, "16kB");
    assert_eq!(board.l1i_size, "16kB");
    assert_eq!(board.l2_size, "256kB");
    assert_eq!(board.memory_model, "DRAMSysHBM2");
}

#[test]
fn test_processor_config_defaults() {
    let processor = ProcessorConfig::default();
    assert_eq!(processor.starting_core, CoreVariant::Fast);
    assert_eq!(processor.switch_core, CoreVariant::Detailed);
    assert_eq!(processor.fetch_buffer_size, 32);
    assert!(processor.validate().is_ok());
}

#[test]
fn test_workload_config_defaults() {
    let workload = WorkloadConfig::default();
    assert_eq!(workload.bootloader, "arm64-bootloader-foundation");
    assert!(workload.readfile.is_some());
    assert_eq!(
        workload.kernel_args,
        vec![
            "console=ttyAMA0",
            "root=/dev/vda2",
            "rootfstype=ext4",
            "rw",
            "earlyprintk=serial,ttyAMA0",
        ]
    );
}

#[test]
fn test_empty_json_is_default() {
    let config = Config::from_json_str("{}").unwrap();
    let default = Config::default();
    assert_eq!(config.memory.reserved, default.memory.reserved);
    assert_eq!(config.workload.kernel_args, default.workload.kernel_args);
    assert_eq!(config.checkpoint.dir, default.checkpoint.dir);
}

#[test]
fn test_partial_region_uses_field_defaults() {
    let json = r#"{ "memory": { "reserved": [ { "label": "pim", "base": 3221225472, "size": 4096 } ] } }"#;
    let config = Config::from_json_str(json).unwrap();
    let region = &config.memory.reserved[0];
    assert!(region.no_map);
    assert!(!region.usable_by_os);
    assert!(!region.exclude_in_cmdline);
    assert_eq!(config.memory.ram_base, 0x8000_0000);
}

#[test]
fn test_empty_reservation_list_is_kept() {
    let config = Config::from_json_str(r#"{ "memory": { "reserved": [] } }"#).unwrap();
    assert!(config.memory.reserved.is_empty());
}

#[test]
fn test_resume_policy_deserialization() {
    let config =
        Config::from_json_str(r#"{ "checkpoint": { "resume_policy": "Switched" } }"#).unwrap();
    assert_eq!(config.checkpoint.resume_policy, ResumePolicy::Switched);
}

#[test]
fn test_core_variant_aliases() {
    let config = Config::from_json_str(
        r#"{ "processor": { "starting_core": "Atomic", "switch_core": "O3" } }"#,
    )
    .unwrap();
    assert_eq!(config.processor.starting_core, CoreVariant::Fast);
    assert_eq!(config.processor.switch_core, CoreVariant::Detailed);
}

#[test]
fn test_malformed_json_is_parse_error() {
    let err = Config::from_json_str("{ \"memory\": ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_validate_rejects_zero_cores() {
    let processor = ProcessorConfig {
        num_cores: 0,
        ..ProcessorConfig::default()
    };
    assert_eq!(processor.validate(), Err(ConfigError::NoCores));
}

#[test]
fn test_validate_rejects_identical_variants() {
    let processor = ProcessorConfig {
        switch_core: CoreVariant::Fast,
        ..ProcessorConfig::default()
    };
    assert_eq!(
        processor.validate(),
        Err(ConfigError::IdenticalVariants(CoreVariant::Fast))
    );
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "processor": {{ "num_cores": 4, "fetch_buffer_size": 16 }} }}"#).unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.processor.num_cores, 4);
    assert_eq!(config.processor.fetch_buffer_size, 16);
}

#[test]
fn test_load_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_read_error_keeps_io_source() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.json")).unwrap_err();
    let ConfigError::Read { ref source, .. } = err else {
        panic!("expected a read error, got {err}");
    };
    assert_eq!(source.kind(), std::io::ErrorKind::NotFound);

    let cause = std::error::Error::source(&err).unwrap();
    let io = cause.downcast_ref::<IoFailure>().unwrap();
    assert_eq!(io.io_error().kind(), std::io::ErrorKind::NotFound);
    assert_eq!(err.clone(), err);
}

#[test]
fn test_resolve_path_joins_working_dir() {
    let mut config = Config::default();
    config.general.working_dir = PathBuf::from("/sim/run");
    assert_eq!(
        config.resolve_path("checkpoint"),
        PathBuf::from("/sim/run/checkpoint")
    );
    assert_eq!(config.resolve_path("/abs/image"), PathBuf::from("/abs/image"));
}

#[test]
fn test_config_serialization_roundtrip() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    let back = Config::from_json_str(&json).unwrap();
    assert_eq!(back.memory.reserved, config.memory.reserved);
    assert_eq!(back.processor.switch_core, config.processor.switch_core);
}
