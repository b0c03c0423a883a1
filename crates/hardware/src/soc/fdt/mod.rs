//! In-memory firmware description tree.
//!
//! The engine's board model produces a [`FdtNode`] tree describing the platform; this crate
//! appends the PIM reservations to it ([`augment`]) and flattens it into a device tree blob
//! ([`blob::to_dtb`]). The tree keeps properties and children in insertion order so that
//! identical inputs always flatten to identical bytes.

pub mod augment;
pub mod blob;

use serde::Serialize;

pub use augment::{augment, region_node, reserved_memory_node, with_reserved_memory};

/// Value of a device tree property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropertyValue {
    /// Presence-only flag (`no-map;`, `ranges;`).
    Empty,
    /// Big-endian 32-bit cells.
    Words(Vec<u32>),
    /// Big-endian 64-bit values.
    Quads(Vec<u64>),
    /// NUL-terminated string.
    String(String),
    /// List of NUL-terminated strings.
    Strings(Vec<String>),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// A named device tree property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FdtProperty {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: PropertyValue,
}

impl FdtProperty {
    /// A presence-only property.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Empty,
        }
    }

    /// A property holding 32-bit cells.
    pub fn words(name: impl Into<String>, words: impl Into<Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Words(words.into()),
        }
    }

    /// A property holding 64-bit values.
    pub fn quads(name: impl Into<String>, quads: impl Into<Vec<u64>>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Quads(quads.into()),
        }
    }

    /// A string property.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::String(value.into()),
        }
    }

    /// A string list property.
    pub fn strings(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Strings(values),
        }
    }

    /// The value as 32-bit cells; 64-bit values are split high word first.
    pub fn as_cells(&self) -> Option<Vec<u32>> {
        match &self.value {
            PropertyValue::Words(words) => Some(words.clone()),
            PropertyValue::Quads(quads) => Some(
                quads
                    .iter()
                    .flat_map(|q| [(q >> 32) as u32, *q as u32])
                    .collect(),
            ),
            _ => None,
        }
    }

    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A device tree node: a name, ordered properties, and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FdtNode {
    name: String,
    properties: Vec<FdtProperty>,
    children: Vec<FdtNode>,
}

impl FdtNode {
    /// Creates an empty node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an empty root node (the root's name is the empty string).
    pub fn root() -> Self {
        Self::new("")
    }

    /// Node name including any unit address.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for a root node.
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Properties in insertion order.
    pub fn properties(&self) -> &[FdtProperty] {
        &self.properties
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[FdtNode] {
        &self.children
    }

    /// Appends a property. Duplicate names are not checked here; the blob writer rejects them.
    pub fn append_property(&mut self, property: FdtProperty) {
        self.properties.push(property);
    }

    /// Appends a child node.
    pub fn append_child(&mut self, child: FdtNode) {
        self.children.push(child);
    }

    /// Builder form of [`FdtNode::append_property`].
    #[must_use]
    pub fn with_property(mut self, property: FdtProperty) -> Self {
        self.append_property(property);
        self
    }

    /// Builder form of [`FdtNode::append_child`].
    #[must_use]
    pub fn with_child(mut self, child: FdtNode) -> Self {
        self.append_child(child);
        self
    }

    /// First property named `name`.
    pub fn property(&self, name: &str) -> Option<&FdtProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Returns `true` if a property named `name` is present.
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// First child named exactly `name`.
    pub fn child(&self, name: &str) -> Option<&FdtNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children named exactly `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FdtNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Encodes a 64-bit address and size as four cells for `#address-cells = <2>`, `#size-cells = <2>`.
pub fn reg_cells(base: u64, size: u64) -> [u32; 4] {
    [(base >> 32) as u32, base as u32, (size >> 32) as u32, size as u32]
}

/// Decodes a `reg` property into `(address, size)` entries.
///
/// `address_cells` and `size_cells` come from the parent's `#address-cells` and
/// `#size-cells`; widths of one or two cells are supported. The property must hold a
/// non-zero whole number of entries.
pub fn decode_reg(cells: &[u32], address_cells: u32, size_cells: u32) -> Option<Vec<(u64, u64)>> {
    let address_cells = usize::try_from(address_cells).ok()?;
    let size_cells = usize::try_from(size_cells).ok()?;
    if !(1..=2).contains(&address_cells) || !(1..=2).contains(&size_cells) {
        return None;
    }
    let stride = address_cells + size_cells;
    if cells.is_empty() || cells.len() % stride != 0 {
        return None;
    }
    Some(
        cells
            .chunks_exact(stride)
            .map(|entry| {
                let (address, size) = entry.split_at(address_cells);
                (join_cells(address), join_cells(size))
            })
            .collect(),
    )
}

fn join_cells(cells: &[u32]) -> u64 {
    cells.iter().fold(0, |acc, &cell| (acc << 32) | u64::from(cell))
}
