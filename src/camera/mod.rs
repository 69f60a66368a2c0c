/// Viewer camera
///
/// The camera is a collaborator: each frame it hands the renderer a
/// `CameraFrame` (view matrix, projection matrix, clip planes).
/// - camera_data.rs: fly-camera state and the per-frame handoff
/// - camera_operations.rs: free functions that derive one from the other

pub mod camera_data;
pub mod camera_operations;

pub use camera_data::{CameraData, CameraFrame};

pub use camera_operations::{
    build_camera_frame, build_projection_matrix, build_view_matrix, calculate_forward_vector,
    init_camera, init_camera_looking_at, move_by, rotate, update_aspect_ratio,
};
