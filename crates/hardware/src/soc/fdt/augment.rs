//! Reserved-memory augmentation of a generated device tree.
//!
//! The board model generates the platform tree; [`augment`] calls that generator and appends
//! a `reserved-memory` node describing the PIM windows:
//!
//! ```text
//! reserved-memory {
//!     #address-cells = <2>;
//!     #size-cells = <2>;
//!     ranges;
//!     pim_config@c0000000 {
//!         reg = <0x0 0xc0000000 0x0 0x4000>;
//!         no-map;
//!         linux,usable-memory = <0>;
//!     };
//! };
//! ```
//!
//! Augmentation is composition, not patching: the generator is a parameter and nothing
//! global is modified. Augmenting the same tree twice appends a second `reserved-memory` node.

use tracing::{debug, info};

use super::{FdtNode, FdtProperty, reg_cells};
use crate::common::constants::{
    PROP_NO_MAP, PROP_USABLE_MEMORY, RESERVED_ADDRESS_CELLS, RESERVED_MEMORY_NODE,
    RESERVED_SIZE_CELLS,
};
use crate::soc::reservation::MemoryRegion;

/// Calls `base_generator` and appends a `reserved-memory` node for `regions` to its root.
///
/// With no regions the generated tree is returned unchanged.
pub fn augment<G>(base_generator: G, regions: &[MemoryRegion]) -> FdtNode
where
    G: FnOnce() -> FdtNode,
{
    let mut root = base_generator();
    if regions.is_empty() {
        debug!("no reserved regions, device tree left unchanged");
        return root;
    }
    root.append_child(reserved_memory_node(regions));
    info!(count = regions.len(), "appended reserved-memory node");
    root
}

/// Wraps `base_generator` into a generator that produces the augmented tree.
pub fn with_reserved_memory<G>(base_generator: G, regions: Vec<MemoryRegion>) -> impl FnOnce() -> FdtNode
where
    G: FnOnce() -> FdtNode,
{
    move || augment(base_generator, &regions)
}

/// Builds the `reserved-memory` node with one child per region, in order.
pub fn reserved_memory_node(regions: &[MemoryRegion]) -> FdtNode {
    let mut node = FdtNode::new(RESERVED_MEMORY_NODE)
        .with_property(FdtProperty::words("#address-cells", [RESERVED_ADDRESS_CELLS]))
        .with_property(FdtProperty::words("#size-cells", [RESERVED_SIZE_CELLS]))
        .with_property(FdtProperty::empty("ranges"));
    for region in regions {
        node.append_child(region_node(region));
    }
    node
}

/// Builds the child node for one region.
pub fn region_node(region: &MemoryRegion) -> FdtNode {
    let mut node = FdtNode::new(region.node_name())
        .with_property(FdtProperty::words("reg", reg_cells(region.base, region.size)));
    if region.no_map {
        node.append_property(FdtProperty::empty(PROP_NO_MAP));
    }
    if !region.usable_by_os {
        node.append_property(FdtProperty::words(PROP_USABLE_MEMORY, [0_u32]));
    }
    node
}
