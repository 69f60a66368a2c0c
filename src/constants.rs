//! Crate-wide constants
//!
//! Tuning defaults and hard limits shared by the reference and GPU backends.

/// Heap sizing and addressing
pub mod heap {
    /// Index 0 is the list terminator / "no node" sentinel
    pub const NULL_NODE: u32 = 0;

    /// First index handed out by a freshly reset allocation pointer
    pub const FIRST_NODE: u32 = 1;

    /// Smallest heap exponent; tiny viewports still get 2^8 slots
    pub const MIN_CAPACITY_EXP: u32 = 8;

    /// Largest heap exponent the 2D backing store can address (8192 x 8192)
    pub const MAX_CAPACITY_EXP: u32 = 26;

    /// Default sizing hint: expected fragments per pixel
    pub const DEFAULT_AVG_LAYERS_PER_PIXEL: u32 = 2;
}

/// Hierarchy (mip pyramid) limits
pub mod hierarchy {
    /// Default maximum number of levels, level 0 included
    pub const DEFAULT_MAX_LEVELS: u32 = 8;

    /// Hard upper bound on the configured level count
    pub const MAX_LEVELS_LIMIT: u32 = 16;
}

/// Trace preview tuning
pub mod trace {
    /// Upper bound of the iteration-budget control
    pub const MAX_ITERATIONS: u32 = 512;

    /// Iteration budget used right after startup
    pub const DEFAULT_ITERATIONS: u32 = 128;

    /// Depth slab (eye units) a fragment occupies for intersection tests
    pub const DEFAULT_FRAGMENT_THICKNESS: f32 = 0.05;

    /// Nudge applied when stepping across a cell boundary (normalized units)
    pub const CELL_NUDGE: f32 = 1.0e-6;
}

/// GPU dispatch parameters
pub mod gpu {
    /// Compute workgroup edge for per-pixel passes (8x8 invocations)
    pub const WORKGROUP_EDGE: u32 = 8;

    /// Stride between per-object uniform blocks (min uniform offset alignment)
    pub const OBJECT_UNIFORM_STRIDE: u64 = 256;

    /// Initial number of per-object uniform slots
    pub const INITIAL_OBJECT_SLOTS: u64 = 64;

    /// Format of the internal (write-masked) target bound during the heap build
    pub const BUILD_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

    /// Format of the range pyramid texture: offset, count, min depth, max depth
    pub const RANGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Uint;

    /// Format of the node heap texture: next, depth bits, payload, unused
    pub const NODE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Uint;

    /// Depth-array texel: depth bits, payload
    pub const DEPTH_ARRAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Uint;
}

/// Work groups needed to cover `extent` invocations with `edge`-wide groups
pub const fn workgroups_for(extent: u32, edge: u32) -> u32 {
    (extent + edge - 1) / edge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroups_round_up() {
        assert_eq!(workgroups_for(0, 8), 0);
        assert_eq!(workgroups_for(1, 8), 1);
        assert_eq!(workgroups_for(8, 8), 1);
        assert_eq!(workgroups_for(9, 8), 2);
        assert_eq!(workgroups_for(100, 8), 13);
    }
}
