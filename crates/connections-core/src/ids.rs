//! Stable, recyclable identifiers for segments and synapses (§4.1).

use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Identifier for a segment, stable across unrelated mutations.
///
/// A `SegmentId` is opaque to callers beyond its `Display` form and equality;
/// the raw value is exposed only so `mapSegmentsToCells`-style bulk kernels
/// can index flat output buffers by it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SegmentId(u32);

/// Identifier for a synapse, stable across unrelated mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SynapseId(u32);

macro_rules! impl_dense_id {
    ($ty:ident, $tag:expr) => {
        impl $ty {
            /// Sentinel used for "no identifier" — never returned by the
            /// allocator for a live handle.
            pub const INVALID: Self = Self(u32::MAX);

            pub(crate) const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// The raw dense index backing this identifier.
            pub const fn raw(&self) -> u32 {
                self.0
            }

            /// `true` unless this is the [`Self::INVALID`] sentinel.
            pub const fn is_valid(&self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $tag, self.0)
            }
        }
    };
}

impl_dense_id!(SegmentId, "S");
impl_dense_id!(SynapseId, "Y");

/// High-water-mark-plus-free-list allocator for a single kind of dense,
/// recyclable identifier.
///
/// `allocate` prefers a released slot from the free list; only when the free
/// list is empty does it bump the high-water mark. `flat_list_length` is the
/// high-water mark, not the live count, so output buffers indexed by raw ID
/// stay valid-sized across deletions (§4.1).
#[derive(Debug, Clone, Default)]
pub(crate) struct Allocator {
    high_water_mark: u32,
    free_list: Vec<u32>,
}

impl Allocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier, preferring a recycled slot.
    pub(crate) fn allocate(&mut self) -> u32 {
        if let Some(recycled) = self.free_list.pop() {
            return recycled;
        }
        let raw = self.high_water_mark;
        self.high_water_mark += 1;
        raw
    }

    /// Release `raw` back to the free list for future reuse.
    pub(crate) fn release(&mut self, raw: u32) {
        self.free_list.push(raw);
    }

    /// One past the largest identifier ever issued — the flat-list length.
    pub(crate) fn flat_list_length(&self) -> usize {
        self.high_water_mark as usize
    }
}
