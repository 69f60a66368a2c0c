//! Heap data structures - plain data
//!
//! All addressing math lives in heap_operations.rs

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Addressing epoch; bumped on every reallocation of the heaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct HeapEpoch(pub u32);

/// Heap configuration derived from the viewport and the sizing hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapInfo {
    /// Number of addressable slots, always a power of two
    pub capacity: u32,
    /// log2(capacity)
    pub capacity_exp: u32,
    /// log2 of the backing store width
    pub width_exp: u32,
    /// log2 of the backing store height
    pub height_exp: u32,
    /// `(1 << width_exp) - 1`
    pub x_mask: u32,
    /// `width_exp`
    pub y_shift: u32,
    /// Viewport the heap was sized for
    pub viewport: (u32, u32),
    /// Addressing epoch this configuration belongs to
    pub epoch: HeapEpoch,
}

/// Heap addressing as seen by shaders (leading fields of `FrameInfo` in common.wgsl)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct HeapInfoUniform {
    pub size: u32,
    pub width: u32,
    pub x_mask: u32,
    pub y_shift: u32,
}

const_assert_eq!(std::mem::size_of::<HeapInfoUniform>(), 16);
