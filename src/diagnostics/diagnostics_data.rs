//! Diagnostics data

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Raw allocator state at the end of a frame (layout of the device counter buffer)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DiagnosticsCounters {
    /// Fragment heap allocation pointer; every append bumps it, dropped or not
    pub node_alloc_pointer: u32,
    /// Depth array allocation pointer after compaction
    pub depth_alloc_pointer: u32,
    /// Pixels whose compacted span was cut short
    pub truncated_pixels: u32,
    pub _padding: u32,
}

const_assert_eq!(std::mem::size_of::<DiagnosticsCounters>(), 16);

/// Telemetry of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDiagnostics {
    pub frame_index: u64,
    pub viewport: (u32, u32),
    pub capacity: u32,
    /// Appends attempted by the build pass
    pub fragments_requested: u32,
    /// Appends that got a node
    pub fragments_stored: u32,
    pub fragments_dropped: u32,
    /// Samples addressed outside the viewport (reference backend only)
    pub fragments_rejected: u32,
    pub avg_fragments_per_pixel: f32,
    pub depth_slots_reserved: u32,
    pub truncated_pixels: u32,
    pub hierarchy_levels: u32,
    /// The configured level cap stopped the pyramid early
    pub hierarchy_truncated: bool,
    /// Either heap ran out of space
    pub overflowed: bool,
    /// False while the trace preview reuses the baked buffers
    pub rebuilt: bool,
}
