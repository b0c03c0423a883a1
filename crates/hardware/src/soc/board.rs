//! Default platform device tree generator.
//!
//! Engines normally supply their own generator describing the full platform. This one
//! produces the minimal tree a Linux guest needs on the reference board (root cell layout,
//! `/chosen` with the boot arguments, the RAM window, and the CPUs) so that the augmented
//! blob can be generated and inspected without an engine.

use super::fdt::{FdtNode, FdtProperty, reg_cells};
use crate::config::Config;

/// Builds the base platform tree for `config` with `bootargs` in `/chosen`.
///
/// The RAM node covers the whole RAM window; reservations are expressed separately by
/// the `reserved-memory` node appended during augmentation.
pub fn base_device_tree(config: &Config, bootargs: &str) -> FdtNode {
    let ram = config.memory.ram_window();

    let chosen = FdtNode::new("chosen").with_property(FdtProperty::string("bootargs", bootargs));

    let memory = FdtNode::new(format!("memory@{:x}", ram.base))
        .with_property(FdtProperty::string("device_type", "memory"))
        .with_property(FdtProperty::words("reg", reg_cells(ram.base, ram.size)));

    let mut cpus = FdtNode::new("cpus")
        .with_property(FdtProperty::words("#address-cells", [1_u32]))
        .with_property(FdtProperty::words("#size-cells", [0_u32]));
    for id in 0..config.processor.num_cores {
        cpus.append_child(
            FdtNode::new(format!("cpu@{id}"))
                .with_property(FdtProperty::string("device_type", "cpu"))
                .with_property(FdtProperty::string("compatible", "arm,armv8"))
                .with_property(FdtProperty::string("enable-method", "psci"))
                .with_property(FdtProperty::words("reg", [id as u32])),
        );
    }

    FdtNode::root()
        .with_property(FdtProperty::strings(
            "compatible",
            vec!["arm,vexpress".to_string(), "arm,foundation-aarch64".to_string()],
        ))
        .with_property(FdtProperty::string("model", "V2P-AARCH64"))
        .with_property(FdtProperty::words("#address-cells", [2_u32]))
        .with_property(FdtProperty::words("#size-cells", [2_u32]))
        .with_child(chosen)
        .with_child(memory)
        .with_child(cpus)
}
