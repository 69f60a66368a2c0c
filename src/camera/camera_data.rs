//! Camera state and the matrices the renderer consumes

use cgmath::{Matrix4, Point3, SquareMatrix};

/// Fly-camera parameters used to produce per-frame matrices
#[derive(Debug, Clone, Copy)]
pub struct CameraData {
    /// Eye position, world units
    pub position: Point3<f32>,

    /// Heading about +Y; -PI/2 faces -Z
    pub yaw_radians: f32,

    /// Elevation, clamped short of the poles by `rotate`
    pub pitch_radians: f32,

    /// Vertical aperture in radians
    pub fov_radians: f32,

    /// Viewport width over height
    pub aspect_ratio: f32,

    /// Eye distance of the near plane
    pub near_plane: f32,
    /// Eye distance of the far plane
    pub far_plane: f32,
}

/// What the renderer consumes from the camera each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// World to view transform
    pub view: Matrix4<f32>,

    /// View to clip transform
    pub projection: Matrix4<f32>,

    /// Near clipping plane distance (eye units)
    pub near_plane: f32,

    /// Far clipping plane distance (eye units)
    pub far_plane: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 3.0),
            yaw_radians: -std::f32::consts::FRAC_PI_2,
            pitch_radians: 0.0,
            fov_radians: std::f32::consts::FRAC_PI_2,
            aspect_ratio: 4.0 / 3.0,
            near_plane: 0.25,
            far_plane: 50.0,
        }
    }
}

impl Default for CameraFrame {
    fn default() -> Self {
        Self {
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            near_plane: 0.25,
            far_plane: 50.0,
        }
    }
}
