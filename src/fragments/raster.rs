//! Reference rasteriser
//!
//! Turns scene triangles into fragment samples the way the device rasteriser does
//! for the build pass: pixel-centre sampling, no depth test, no face culling, every
//! covered sample becomes one fragment. Depth is positive eye depth (`clip.w`),
//! interpolated perspective-correctly. Triangles are clipped against the near plane
//! in homogeneous space, so geometry reaching behind the eye keeps its visible part.

use super::fragment_data::FragmentSample;
use super::fragment_operations::pack_normal;
use crate::camera::CameraFrame;
use crate::scene::{Scene, SceneObject};
use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};
use rayon::prelude::*;

/// Floor of the clip plane for cameras whose near plane sits at or behind the eye
const MIN_CLIP_W: f32 = 1.0e-5;

/// Corner of a triangle before the perspective divide
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vector4<f32>,
    normal: Vector3<f32>,
}

#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    /// 1 / clip.w
    inv_w: f32,
    normal: Vector3<f32>,
}

/// Edge function: positive when `p` lies left of `a -> b` in screen space
#[inline]
fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Tie-break for samples exactly on an edge. Antisymmetric in (a, b), so a sample on
/// an edge shared by two triangles is claimed by exactly one of them.
#[inline]
fn owns_edge(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    a.y > b.y || (a.y == b.y && a.x < b.x)
}

#[inline]
fn covers(weight: f32, a: &ScreenVertex, b: &ScreenVertex) -> bool {
    weight > 0.0 || (weight == 0.0 && owns_edge(a, b))
}

pub(crate) fn normal_matrix(transform: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_cols(
        transform.x.truncate(),
        transform.y.truncate(),
        transform.z.truncate(),
    );
    linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or_else(Matrix3::identity)
}

/// Sutherland-Hodgman against the single plane `w = min_w`. A triangle yields an
/// empty polygon, itself, or a triangle or quad in the original winding.
fn clip_near(triangle: [ClipVertex; 3], min_w: f32) -> Vec<ClipVertex> {
    let mut polygon = Vec::with_capacity(4);
    for (i, current) in triangle.iter().enumerate() {
        let next = &triangle[(i + 1) % 3];
        let current_inside = current.clip.w >= min_w;
        if current_inside {
            polygon.push(*current);
        }
        if current_inside != (next.clip.w >= min_w) {
            // Always cut from the inside corner so a shared edge lands on the same point
            // in both triangles. Clip coordinates are affine in object space, so one t
            // serves every attribute.
            let (inside, outside) = if current_inside {
                (current, next)
            } else {
                (next, current)
            };
            let t = (min_w - inside.clip.w) / (outside.clip.w - inside.clip.w);
            polygon.push(ClipVertex {
                clip: inside.clip + (outside.clip - inside.clip) * t,
                normal: inside.normal + (outside.normal - inside.normal) * t,
            });
        }
    }
    polygon
}

/// Perspective divide and viewport mapping; `vertex.clip.w` is positive after clipping
fn to_screen(vertex: &ClipVertex, viewport: (u32, u32)) -> ScreenVertex {
    let inv_w = 1.0 / vertex.clip.w;
    ScreenVertex {
        x: (vertex.clip.x * inv_w * 0.5 + 0.5) * viewport.0 as f32,
        y: (0.5 - vertex.clip.y * inv_w * 0.5) * viewport.1 as f32,
        inv_w,
        normal: vertex.normal,
    }
}

fn rasterize_triangle(
    mut v: [ScreenVertex; 3],
    camera: &CameraFrame,
    viewport: (u32, u32),
    out: &mut Vec<FragmentSample>,
) {
    let mut area = edge(&v[0], &v[1], v[2].x, v[2].y);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    if area < 0.0 {
        v.swap(1, 2);
        area = -area;
    }

    let (width, height) = viewport;
    let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    // Pixel px is sampled at px + 0.5
    let x0 = (min_x - 0.5).ceil().max(0.0) as u32;
    let y0 = (min_y - 0.5).ceil().max(0.0) as u32;
    let x1 = ((max_x - 0.5).floor() + 1.0).clamp(0.0, width as f32) as u32;
    let y1 = ((max_y - 0.5).floor() + 1.0).clamp(0.0, height as f32) as u32;

    for py in y0..y1 {
        let sy = py as f32 + 0.5;
        for px in x0..x1 {
            let sx = px as f32 + 0.5;
            let w0 = edge(&v[1], &v[2], sx, sy);
            let w1 = edge(&v[2], &v[0], sx, sy);
            let w2 = edge(&v[0], &v[1], sx, sy);
            if !(covers(w0, &v[1], &v[2]) && covers(w1, &v[2], &v[0]) && covers(w2, &v[0], &v[1]))
            {
                continue;
            }

            let b0 = w0 / area * v[0].inv_w;
            let b1 = w1 / area * v[1].inv_w;
            let b2 = w2 / area * v[2].inv_w;
            let inv_depth = b0 + b1 + b2;
            if inv_depth <= 0.0 {
                continue;
            }
            let depth = 1.0 / inv_depth;
            if depth < camera.near_plane || depth > camera.far_plane {
                continue;
            }

            let normal = (v[0].normal * b0 + v[1].normal * b1 + v[2].normal * b2) * depth;
            let normal = if normal.magnitude2() > 0.0 {
                normal.normalize()
            } else {
                Vector3::unit_z()
            };

            out.push(FragmentSample {
                pixel: py * width + px,
                depth,
                payload: pack_normal(normal.into()),
            });
        }
    }
}

/// Rasterize one object; samples come out in triangle order, row-major within a triangle
pub fn rasterize_object(
    object: &SceneObject,
    camera: &CameraFrame,
    viewport: (u32, u32),
) -> Vec<FragmentSample> {
    let mvp = camera.projection * camera.view * object.transform;
    let normals = normal_matrix(&object.transform);
    let min_w = camera.near_plane.max(MIN_CLIP_W);

    object
        .positions
        .par_chunks_exact(3)
        .enumerate()
        .flat_map_iter(|(face, tri)| {
            let corners: [ClipVertex; 3] = std::array::from_fn(|corner| ClipVertex {
                clip: mvp * Vector3::from(tri[corner]).extend(1.0),
                normal: object
                    .normals
                    .get(face * 3 + corner)
                    .map(|n| normals * Vector3::from(*n))
                    .unwrap_or_else(Vector3::unit_z),
            });
            let screen: Vec<ScreenVertex> = clip_near(corners, min_w)
                .iter()
                .map(|vertex| to_screen(vertex, viewport))
                .collect();

            // Fan out the clipped polygon; shared diagonals follow the edge tie-break
            let mut samples = Vec::new();
            for i in 1..screen.len().saturating_sub(1) {
                rasterize_triangle(
                    [screen[0], screen[i], screen[i + 1]],
                    camera,
                    viewport,
                    &mut samples,
                );
            }
            samples
        })
        .collect()
}

/// Rasterize every object of the scene in draw order
pub fn rasterize_scene(
    scene: &Scene,
    camera: &CameraFrame,
    viewport: (u32, u32),
) -> Vec<FragmentSample> {
    let samples: Vec<FragmentSample> = scene
        .objects
        .iter()
        .flat_map(|object| rasterize_object(object, camera, viewport))
        .collect();
    log::trace!(
        "[rasterize_scene] {} objects -> {} fragment samples",
        scene.objects.len(),
        samples.len()
    );
    samples
}
