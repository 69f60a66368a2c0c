/// Scene Module - geometry input consumed once per frame by the heap build
///
/// Mesh import and upload are collaborators; this module only carries the
/// triangle soup `{positions, normals, transform}` per object and a few
/// procedural shapes used by the demo and the tests.

pub mod scene_data;
pub mod scene_operations;

pub use scene_data::{Scene, SceneObject};
pub use scene_operations::{
    create_box_object, create_object, create_quad_object, face_normal, set_object_transform,
    triangle_count,
};
