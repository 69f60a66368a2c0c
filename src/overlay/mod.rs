/// Overlay Module - baked frustum drawn from the live camera
///
/// Operator feedback only: the eight corners of the baked frustum are recovered
/// from the inverse baked view-projection and its twelve edges are emitted as a
/// line list in live clip space.

pub mod overlay_data;
pub mod overlay_operations;

pub use overlay_data::{OverlayVertex, FRUSTUM_EDGES};
pub use overlay_operations::{frustum_corners_world, frustum_edges_in_live_clip};
