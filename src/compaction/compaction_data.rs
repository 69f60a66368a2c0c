//! Compaction data structures

use crate::heap::HeapInfo;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::sync::atomic::AtomicU32;

/// One texel of the range index (`Rgba32Uint` on the device, depths as f32 bits)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RangeEntry {
    /// First slot of the span in the depth arrays
    pub offset: u32,
    /// Fragments in the footprint; 0 means empty
    pub count: u32,
    /// Nearest fragment depth in the footprint
    pub min_depth: f32,
    /// Farthest fragment depth in the footprint
    pub max_depth: f32,
}

const_assert_eq!(std::mem::size_of::<RangeEntry>(), 16);

impl RangeEntry {
    /// Entry of a pixel with no fragments; depth bounds are an empty interval
    pub const EMPTY: RangeEntry = RangeEntry {
        offset: 0,
        count: 0,
        min_depth: f32::MAX,
        max_depth: f32::MIN,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// One level of the range pyramid, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct RangeLevel {
    pub width: u32,
    pub height: u32,
    pub entries: Vec<RangeEntry>,
}

impl RangeLevel {
    /// Level of the given extent with every entry empty
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            entries: vec![RangeEntry::EMPTY; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn entry(&self, x: u32, y: u32) -> RangeEntry {
        self.entries[(y * self.width + x) as usize]
    }
}

/// One compacted fragment (mirrors `vec2<u32>` in the depth-array buffer)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DepthSample {
    pub depth: f32,
    pub payload: u32,
}

const_assert_eq!(std::mem::size_of::<DepthSample>(), 8);

/// Second heap: contiguous per-pixel spans written once per compaction
pub struct DepthArrays {
    /// Sized and addressed like the fragment heap of the same epoch
    pub info: HeapInfo,
    pub depth_bits: Vec<AtomicU32>,
    pub payload: Vec<AtomicU32>,
    /// Span allocator; reset to 1 at the start of every compaction
    pub alloc_pointer: AtomicU32,
}

/// Aggregate outcome of a compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Slots reserved by all pixels, overflow included
    pub reserved: u32,
    /// Fragments actually copied into the depth arrays
    pub written: u32,
    /// Pixels whose span was cut short by capacity exhaustion
    pub truncated_pixels: u32,
}

impl CompactionReport {
    pub fn overflowed(&self) -> bool {
        self.truncated_pixels > 0
    }
}
