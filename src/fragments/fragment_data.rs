//! Fragment heap data structures
//!
//! Storage is atomic so that the build pass can be run from many threads at once;
//! the node fields live in a 2D backing store addressed through `heap::encode`.

use crate::heap::HeapInfo;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::sync::atomic::AtomicU32;

/// Snapshot of one heap slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentNode {
    /// Next node of the same pixel, 0 terminates the list
    pub next: u32,
    /// Eye-space depth of the sample
    pub depth: f32,
    /// Opaque payload (packed normal)
    pub payload: u32,
}

/// One rasterized sample waiting to be appended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentSample {
    /// Row-major pixel index
    pub pixel: u32,
    pub depth: f32,
    pub payload: u32,
}

/// Result of a single append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Linked in at this node index
    Stored(u32),
    /// Allocation ran past capacity
    Dropped,
    /// The pixel lies outside the viewport; the heap was not touched
    OutsideViewport,
}

/// Aggregate outcome of a build pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Samples presented to the heap
    pub requested: u32,
    /// Samples linked into a list
    pub stored: u32,
    /// Samples lost to capacity exhaustion
    pub dropped: u32,
    /// Samples addressed to a pixel outside the viewport
    pub rejected: u32,
}

/// CPU-resident fragment heap: per-pixel heads, node store, allocation pointer
pub struct FragmentHeap {
    pub info: HeapInfo,
    /// Head node per pixel (row-major), 0 when empty
    pub heads: Vec<AtomicU32>,
    /// Node `next` field per storage slot
    pub next: Vec<AtomicU32>,
    /// Node depth (f32 bits) per storage slot
    pub depth_bits: Vec<AtomicU32>,
    /// Node payload per storage slot
    pub payload: Vec<AtomicU32>,
    /// Next free node index; reset to 1 at the start of every build
    pub alloc_pointer: AtomicU32,
}

/// Node layout of the GPU node texture texel (`Rgba32Uint`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuFragmentNode {
    pub next: u32,
    pub depth_bits: u32,
    pub payload: u32,
    pub _reserved: u32,
}

const_assert_eq!(std::mem::size_of::<GpuFragmentNode>(), 16);
