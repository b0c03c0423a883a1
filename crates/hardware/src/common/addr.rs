//! Physical address ranges.
//!
//! This module defines the half-open physical address range used for RAM windows and
//! reservations. It provides overflow-checked end computation, containment, and overlap tests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A half-open physical address range `[base, base + size)`.
///
/// Construction does not validate the range; callers that need a well-formed
/// range use [`AddrRange::end`], which reports overflow instead of wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddrRange {
    /// First byte of the range.
    pub base: u64,
    /// Length of the range in bytes.
    pub size: u64,
}

impl AddrRange {
    /// Creates a range starting at `base` spanning `size` bytes.
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// One past the last byte of the range, or `None` if it does not fit in 64 bits.
    pub const fn end(&self) -> Option<u64> {
        self.base.checked_add(self.size)
    }

    /// Returns `true` for a zero-length range.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` if `other` lies entirely within `self`.
    ///
    /// Ranges whose end overflows are never contained.
    pub fn contains(&self, other: &Self) -> bool {
        match (self.end(), other.end()) {
            (Some(end), Some(other_end)) => other.base >= self.base && other_end <= end,
            _ => false,
        }
    }

    /// Returns `true` if the two ranges share at least one byte.
    ///
    /// Empty ranges overlap nothing.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let self_end = self.end().unwrap_or(u64::MAX);
        let other_end = other.end().unwrap_or(u64::MAX);
        self.base < other_end && other.base < self_end
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end() {
            Some(end) => write!(f, "[{:#x}, {:#x})", self.base, end),
            None => write!(f, "[{:#x}, overflow)", self.base),
        }
    }
}
