//! Overlay data

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Line-list vertex consumed by frustum_overlay.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct OverlayVertex {
    /// Live clip-space position
    pub position: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<OverlayVertex>(), 16);

/// Corner pairs of a frustum box. Corners 0..4 lie on the near plane, 4..8 on the
/// far plane, both in the order (-1,-1) (1,-1) (1,1) (-1,1).
pub const FRUSTUM_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];
