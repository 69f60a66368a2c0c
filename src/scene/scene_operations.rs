//! Scene operations - builders for procedural objects

use super::scene_data::{Scene, SceneObject};
use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3};

/// Unit normal of the triangle (a, b, c), counter-clockwise front
pub fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let a = Vector3::from(a);
    let ab = Vector3::from(b) - a;
    let ac = Vector3::from(c) - a;
    let n = ab.cross(ac);
    if n.magnitude2() > 0.0 {
        n.normalize().into()
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Build an object from a triangle list; missing normals become flat face normals
pub fn create_object(
    name: &str,
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
) -> Option<SceneObject> {
    let face_count = positions.len() / 3;
    if face_count == 0 {
        return None;
    }
    let mut positions = positions;
    positions.truncate(face_count * 3);

    let normals = match normals {
        Some(normals) if normals.len() >= positions.len() => {
            normals[..positions.len()].to_vec()
        }
        _ => positions
            .chunks_exact(3)
            .flat_map(|tri| {
                let n = face_normal(tri[0], tri[1], tri[2]);
                [n, n, n]
            })
            .collect(),
    };

    Some(SceneObject {
        name: name.to_string(),
        positions,
        normals,
        transform: Matrix4::identity(),
    })
}

/// Axis-aligned quad in the plane z = `z`, spanning `min..max` in x and y
pub fn create_quad_object(name: &str, min: [f32; 2], max: [f32; 2], z: f32) -> SceneObject {
    let a = [min[0], min[1], z];
    let b = [max[0], min[1], z];
    let c = [max[0], max[1], z];
    let d = [min[0], max[1], z];
    let positions = vec![a, b, c, a, c, d];
    SceneObject {
        name: name.to_string(),
        normals: vec![[0.0, 0.0, 1.0]; 6],
        positions,
        transform: Matrix4::identity(),
    }
}

/// Axis-aligned box centred at the origin with the given half extents
pub fn create_box_object(name: &str, half: [f32; 3]) -> SceneObject {
    let [hx, hy, hz] = half;
    let corners = [
        [-hx, -hy, -hz],
        [hx, -hy, -hz],
        [hx, hy, -hz],
        [-hx, hy, -hz],
        [-hx, -hy, hz],
        [hx, -hy, hz],
        [hx, hy, hz],
        [-hx, hy, hz],
    ];
    // Counter-clockwise seen from outside
    const FACES: [[usize; 4]; 6] = [
        [4, 5, 6, 7],
        [1, 0, 3, 2],
        [5, 1, 2, 6],
        [0, 4, 7, 3],
        [7, 6, 2, 3],
        [0, 1, 5, 4],
    ];

    let mut positions = Vec::with_capacity(36);
    for face in FACES {
        let [a, b, c, d] = face.map(|i| corners[i]);
        positions.extend_from_slice(&[a, b, c, a, c, d]);
    }

    // Six positions per face means flat normals are always produced here
    let normals = positions
        .chunks_exact(3)
        .flat_map(|tri| {
            let n = face_normal(tri[0], tri[1], tri[2]);
            [n, n, n]
        })
        .collect();

    SceneObject {
        name: name.to_string(),
        positions,
        normals,
        transform: Matrix4::identity(),
    }
}

/// Replace an object's model transform
pub fn set_object_transform(object: &mut SceneObject, transform: Matrix4<f32>) {
    object.transform = transform;
}

/// Total triangles in the scene
pub fn triangle_count(scene: &Scene) -> usize {
    scene.objects.iter().map(|o| o.positions.len() / 3).sum()
}

impl Scene {
    pub fn with_objects(objects: Vec<SceneObject>) -> Self {
        Self { objects }
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }
}
