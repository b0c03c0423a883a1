//! Flattening of an [`FdtNode`] tree into a device tree blob.

use vm_fdt::FdtWriter;

use super::{FdtNode, PropertyValue};
use crate::common::FdtError;

/// Serializes `root` into a flattened device tree blob.
///
/// Properties are written before children, in insertion order. The writer rejects duplicate
/// property names and invalid node or property names.
pub fn to_dtb(root: &FdtNode) -> Result<Vec<u8>, FdtError> {
    let mut fdt = FdtWriter::new().map_err(FdtError::Writer)?;
    write_node(&mut fdt, root)?;
    fdt.finish().map_err(FdtError::Writer)
}

fn write_node(fdt: &mut FdtWriter, node: &FdtNode) -> Result<(), FdtError> {
    let handle = fdt.begin_node(node.name()).map_err(FdtError::Writer)?;
    for property in node.properties() {
        let name = property.name.as_str();
        let written = match &property.value {
            PropertyValue::Empty => fdt.property_null(name),
            PropertyValue::Words(words) => fdt.property_array_u32(name, words),
            PropertyValue::Quads(quads) => fdt.property_array_u64(name, quads),
            PropertyValue::String(value) => fdt.property_string(name, value),
            PropertyValue::Strings(values) => fdt.property_string_list(name, values.clone()),
            PropertyValue::Bytes(bytes) => fdt.property(name, bytes),
        };
        written.map_err(FdtError::Writer)?;
    }
    for child in node.children() {
        write_node(fdt, child)?;
    }
    fdt.end_node(handle).map_err(FdtError::Writer)
}
