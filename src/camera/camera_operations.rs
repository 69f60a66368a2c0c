//! Camera math. Every function takes a `CameraData` by reference and returns a
//! fresh value.

use super::camera_data::{CameraData, CameraFrame};
use cgmath::{InnerSpace, Matrix4, PerspectiveFov, Point3, Rad, Vector3};

/// Camera at `position` with the default lens
pub fn init_camera(position: Point3<f32>, yaw_radians: f32, pitch_radians: f32) -> CameraData {
    CameraData {
        position,
        yaw_radians,
        pitch_radians,
        ..CameraData::default()
    }
}

/// Camera at `position` aimed at `target`
pub fn init_camera_looking_at(position: Point3<f32>, target: Point3<f32>) -> CameraData {
    let direction = (target - position).normalize();
    let pitch = direction.y.clamp(-1.0, 1.0).asin();
    let yaw = direction.z.atan2(direction.x);
    init_camera(position, yaw, pitch)
}

/// Right-handed world-to-eye transform
pub fn build_view_matrix(camera: &CameraData) -> Matrix4<f32> {
    Matrix4::look_to_rh(
        camera.position,
        calculate_forward_vector(camera.yaw_radians, camera.pitch_radians),
        Vector3::unit_y(),
    )
}

/// OpenGL-style perspective from the camera lens
pub fn build_projection_matrix(camera: &CameraData) -> Matrix4<f32> {
    PerspectiveFov {
        fovy: Rad(camera.fov_radians),
        aspect: camera.aspect_ratio,
        near: camera.near_plane,
        far: camera.far_plane,
    }
    .into()
}

/// Matrices and clip planes handed to the renderer for one frame
pub fn build_camera_frame(camera: &CameraData) -> CameraFrame {
    CameraFrame {
        view: build_view_matrix(camera),
        projection: build_projection_matrix(camera),
        near_plane: camera.near_plane,
        far_plane: camera.far_plane,
    }
}

/// Re-derive the aspect from a viewport; zero extents count as one
pub fn update_aspect_ratio(camera: &CameraData, width: u32, height: u32) -> CameraData {
    CameraData {
        aspect_ratio: width.max(1) as f32 / height.max(1) as f32,
        ..*camera
    }
}

/// Shift the eye by a world-space offset
pub fn move_by(camera: &CameraData, offset: Vector3<f32>) -> CameraData {
    CameraData {
        position: camera.position + offset,
        ..*camera
    }
}

/// Turn by yaw/pitch deltas in radians
pub fn rotate(camera: &CameraData, yaw_delta: f32, pitch_delta: f32) -> CameraData {
    // look_to_rh degenerates when forward is parallel to +Y
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
    CameraData {
        yaw_radians: camera.yaw_radians + yaw_delta,
        pitch_radians: (camera.pitch_radians + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT),
        ..*camera
    }
}

/// Unit view direction for a yaw/pitch pair
pub fn calculate_forward_vector(yaw: f32, pitch: f32) -> Vector3<f32> {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    Vector3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Transform, Vector4};

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let camera = CameraData::default();
        let forward = calculate_forward_vector(camera.yaw_radians, camera.pitch_radians);
        assert!((forward - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn test_looking_at_target_projects_to_center() {
        let camera = init_camera_looking_at(Point3::new(2.0, 1.0, 4.0), Point3::new(0.0, 0.0, 0.0));
        let frame = build_camera_frame(&camera);
        let clip = frame.projection * frame.view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((clip.x / clip.w).abs() < 1e-4);
        assert!((clip.y / clip.w).abs() < 1e-4);
        // clip.w is the eye depth of the target
        let distance = (Point3::new(2.0f32, 1.0, 4.0) - Point3::new(0.0, 0.0, 0.0)).magnitude();
        assert!((clip.w - distance).abs() < 1e-4);
    }

    #[test]
    fn test_view_matrix_moves_camera_to_origin() {
        let camera = init_camera(Point3::new(1.0, 2.0, 3.0), 0.0, 0.0);
        let view = build_view_matrix(&camera);
        let origin = view.transform_point(camera.position);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5 && origin.z.abs() < 1e-5);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let camera = rotate(&CameraData::default(), 0.0, 10.0);
        assert!(camera.pitch_radians < std::f32::consts::FRAC_PI_2);
    }
}
