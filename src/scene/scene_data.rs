//! Scene data structures - plain data

use cgmath::{Matrix4, SquareMatrix};

/// One drawable: non-indexed triangle list plus its model transform
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    /// Three consecutive positions form one triangle
    pub positions: Vec<[f32; 3]>,
    /// One normal per position
    pub normals: Vec<[f32; 3]>,
    pub transform: Matrix4<f32>,
}

/// Everything drawn in one frame
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            transform: Matrix4::identity(),
        }
    }
}
