//! Ray remap and hierarchical march
//!
//! A live pixel's view ray is moved into the baked camera's eye space, clipped to
//! the baked depth slab `[near, far]` and projected onto the baked screen. The
//! march then walks that screen segment through the range pyramid: empty or
//! depth-disjoint cells are skipped at the coarsest level that proves them empty,
//! non-empty cells are refined down to level 0 where the span is scanned.
//!
//! A fragment at depth `d` occupies the slab `[d, d + thickness]`. The hit of a
//! fragment is the first ray parameter whose depth lies inside that slab.

use super::trace_data::{
    BakedRay, BakedSnapshot, MarchParams, RayTransform, TraceError, TraceHit, TraceImage,
    TraceSample,
};
use crate::camera::CameraFrame;
use crate::compaction::{read_depth_sample, DepthArrays, RangeEntry};
use crate::constants::trace::CELL_NUDGE;
use crate::error::HiabResult;
use crate::fragments::unpack_normal;
use crate::heap::ensure_epoch;
use crate::hierarchy::RangePyramid;
use cgmath::{SquareMatrix, Vector4};
use rayon::prelude::*;

/// How far a ray parallel to the baked image plane is followed, in units of far
const PARALLEL_REACH: f32 = 1.0e3;

/// Compose live view space -> world -> baked view space
pub fn build_ray_transform(
    live: &CameraFrame,
    snapshot: &BakedSnapshot,
) -> Result<RayTransform, TraceError> {
    let live_to_world = live.view.invert().ok_or(TraceError::DegenerateCamera)?;
    let p = &live.projection;
    Ok(RayTransform {
        ray_to_bake: snapshot.bake_view * live_to_world,
        live_projection: [p.x.x, p.y.y, p.z.x, p.z.y],
    })
}

/// Liang-Barsky clip of `u0 + s * du`, `s` in `[0, 1]`, against the unit square
pub fn clip_to_viewport(u0: [f32; 2], du: [f32; 2]) -> Option<(f32, f32)> {
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for axis in 0..2 {
        let (q, d) = (u0[axis], du[axis]);
        if d == 0.0 {
            if !(0.0..=1.0).contains(&q) {
                return None;
            }
            continue;
        }
        let a = -q / d;
        let b = (1.0 - q) / d;
        lo = lo.max(a.min(b));
        hi = hi.min(a.max(b));
    }
    (lo <= hi).then_some((lo, hi))
}

fn project_to_bake(snapshot: &BakedSnapshot, point: Vector4<f32>) -> ([f32; 2], f32) {
    let clip = snapshot.bake_projection * point;
    let inv_w = 1.0 / clip.w;
    (
        [clip.x * inv_w * 0.5 + 0.5, 0.5 - clip.y * inv_w * 0.5],
        -point.z,
    )
}

/// Baked-screen segment of the view ray through live pixel `pixel`
pub fn generate_ray(
    transform: &RayTransform,
    snapshot: &BakedSnapshot,
    pixel: (u32, u32),
    live_viewport: (u32, u32),
) -> Option<BakedRay> {
    let ndc_x = (pixel.0 as f32 + 0.5) / live_viewport.0 as f32 * 2.0 - 1.0;
    let ndc_y = 1.0 - (pixel.1 as f32 + 0.5) / live_viewport.1 as f32 * 2.0;
    let [p00, p11, p20, p21] = transform.live_projection;
    let direction = transform.ray_to_bake
        * Vector4::new((ndc_x + p20) / p00, (ndc_y + p21) / p11, -1.0, 0.0);
    let origin = transform.ray_to_bake * Vector4::new(0.0, 0.0, 0.0, 1.0);

    let (near, far) = (snapshot.bake_nearz, snapshot.bake_farz);
    let origin_depth = -origin.z;
    let depth_rate = -direction.z;
    let (mut t0, mut t1) = (0.0f32, f32::INFINITY);
    if depth_rate == 0.0 {
        if origin_depth < near || origin_depth > far {
            return None;
        }
        t1 = far * PARALLEL_REACH;
    } else {
        let ta = (near - origin_depth) / depth_rate;
        let tb = (far - origin_depth) / depth_rate;
        t0 = t0.max(ta.min(tb));
        t1 = t1.min(ta.max(tb));
    }
    if t0 >= t1 {
        return None;
    }

    let (u0, z0) = project_to_bake(snapshot, origin + direction * t0);
    let (u1, z1) = project_to_bake(snapshot, origin + direction * t1);
    let du = [u1[0] - u0[0], u1[1] - u0[1]];
    let (s_start, s_end) = clip_to_viewport(u0, du)?;

    Some(BakedRay {
        u0,
        du,
        inv_z0: 1.0 / z0,
        inv_z1: 1.0 / z1,
        s_start,
        s_end,
    })
}

#[inline]
fn nudge(direction: f32) -> f32 {
    if direction > 0.0 {
        CELL_NUDGE
    } else if direction < 0.0 {
        -CELL_NUDGE
    } else {
        0.0
    }
}

/// Cell of a `width x height` level holding the ray point at `s`, pushed along the ray
fn cell_at(ray: &BakedRay, s: f32, width: u32, height: u32) -> (u32, u32) {
    let [x, y] = ray.point(s);
    let cx = ((x + nudge(ray.du[0])) * width as f32).floor();
    let cy = ((y + nudge(ray.du[1])) * height as f32).floor();
    (
        cx.clamp(0.0, (width - 1) as f32) as u32,
        cy.clamp(0.0, (height - 1) as f32) as u32,
    )
}

/// Ray parameter where the ray leaves `cell`
fn cell_exit(ray: &BakedRay, cell: (u32, u32), width: u32, height: u32) -> f32 {
    let mut exit = f32::INFINITY;
    for (axis, (index, extent)) in [(cell.0, width), (cell.1, height)].into_iter().enumerate() {
        let d = ray.du[axis];
        let boundary = if d > 0.0 {
            (index + 1) as f32 / extent as f32
        } else if d < 0.0 {
            index as f32 / extent as f32
        } else {
            continue;
        };
        exit = exit.min((boundary - ray.u0[axis]) / d);
    }
    exit
}

/// Can the ray over `[a, b]` touch any fragment summarized by `entry`?
fn may_hit(ray: &BakedRay, a: f32, b: f32, entry: &RangeEntry, thickness: f32) -> bool {
    if entry.is_empty() {
        return false;
    }
    let (ia, ib) = (ray.inv_depth(a), ray.inv_depth(b));
    let (lo, hi) = (ia.min(ib), ia.max(ib));
    hi >= 1.0 / (entry.max_depth + thickness) && lo <= 1.0 / entry.min_depth
}

/// First parameter in `[a, b]` whose depth lies in `[depth, depth + thickness]`
fn first_in_slab(ray: &BakedRay, a: f32, b: f32, depth: f32, thickness: f32) -> Option<f32> {
    let (lo, hi) = (1.0 / (depth + thickness), 1.0 / depth);
    let slope = ray.inv_z1 - ray.inv_z0;
    if slope == 0.0 {
        let inv = ray.inv_z0;
        return (inv >= lo && inv <= hi).then_some(a);
    }
    let x0 = (lo - ray.inv_z0) / slope;
    let x1 = (hi - ray.inv_z0) / slope;
    let start = x0.min(x1).max(a);
    let end = x0.max(x1).min(b);
    (start <= end).then_some(start)
}

fn nearest_in_span(
    ray: &BakedRay,
    a: f32,
    b: f32,
    pixel: (u32, u32),
    entry: &RangeEntry,
    arrays: &DepthArrays,
    thickness: f32,
) -> Option<TraceHit> {
    let mut best: Option<TraceHit> = None;
    for slot in entry.offset..entry.offset + entry.count {
        let sample = read_depth_sample(arrays, slot);
        let Some(s) = first_in_slab(ray, a, b, sample.depth, thickness) else {
            continue;
        };
        let closer = match &best {
            None => true,
            Some(hit) => s < hit.s || (s == hit.s && sample.depth < hit.depth),
        };
        if closer {
            best = Some(TraceHit {
                pixel,
                depth: sample.depth,
                payload: sample.payload,
                s,
            });
        }
    }
    best
}

fn march(
    ray: &BakedRay,
    pyramid: &RangePyramid,
    arrays: &DepthArrays,
    params: &MarchParams,
    top: u32,
) -> TraceSample {
    let mut sample = TraceSample::default();
    let thickness = params.fragment_thickness;
    let mut level = top;
    let mut s = ray.s_start;

    while s < ray.s_end {
        if sample.iterations >= params.iteration_budget {
            sample.exhausted = true;
            break;
        }
        sample.iterations += 1;

        let range_level = &pyramid.levels[level as usize];
        let (width, height) = (range_level.width, range_level.height);
        let cell = cell_at(ray, s, width, height);
        let entry = range_level.entry(cell.0, cell.1);
        let mut s_exit = cell_exit(ray, cell, width, height).min(ray.s_end);
        if s_exit <= s {
            s_exit = (s + f32::EPSILON).min(ray.s_end);
        }

        if !may_hit(ray, s, s_exit, &entry, thickness) {
            s = s_exit;
            level = (level + 1).min(top);
            continue;
        }
        if level > 0 {
            level -= 1;
            continue;
        }

        if let Some(hit) = nearest_in_span(ray, s, s_exit, cell, &entry, arrays, thickness) {
            sample.hit = Some(hit);
            break;
        }
        s = s_exit;
        level = top.min(1);
    }
    sample
}

/// Hierarchical march from the coarsest level of the pyramid
pub fn march_ray(
    ray: &BakedRay,
    pyramid: &RangePyramid,
    arrays: &DepthArrays,
    params: &MarchParams,
) -> TraceSample {
    march(ray, pyramid, arrays, params, pyramid.top_level())
}

/// March that only ever reads level 0; the ground truth for the hierarchical march
pub fn march_ray_level0(
    ray: &BakedRay,
    pyramid: &RangePyramid,
    arrays: &DepthArrays,
    params: &MarchParams,
) -> TraceSample {
    march(ray, pyramid, arrays, params, 0)
}

/// March every live pixel against the baked pyramid
pub fn trace_image(
    live: &CameraFrame,
    live_viewport: (u32, u32),
    snapshot: &BakedSnapshot,
    pyramid: &RangePyramid,
    arrays: &DepthArrays,
    params: &MarchParams,
) -> HiabResult<TraceImage> {
    ensure_epoch(pyramid.epoch, arrays.info.epoch)?;
    if pyramid.levels.is_empty() {
        return Err(TraceError::MissingBake.into());
    }
    let transform = build_ray_transform(live, snapshot)?;

    let (width, height) = live_viewport;
    let samples = (0..width * height)
        .into_par_iter()
        .map(|index| {
            let pixel = (index % width, index / width);
            generate_ray(&transform, snapshot, pixel, live_viewport)
                .map(|ray| march_ray(&ray, pyramid, arrays, params))
                .unwrap_or_default()
        })
        .collect();

    Ok(TraceImage {
        width,
        height,
        samples,
    })
}

/// Colour of one trace sample: hits show their normal, exhausted rays are magenta
pub fn shade_sample(sample: &TraceSample, background: [f32; 4]) -> [f32; 4] {
    match (&sample.hit, sample.exhausted) {
        (Some(hit), _) => {
            let [x, y, z] = unpack_normal(hit.payload);
            [x * 0.5 + 0.5, y * 0.5 + 0.5, z * 0.5 + 0.5, 1.0]
        }
        (None, true) => [1.0, 0.0, 1.0, 1.0],
        (None, false) => background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Matrix4;

    fn identity_snapshot() -> BakedSnapshot {
        BakedSnapshot {
            bake_view: Matrix4::identity(),
            bake_projection: cgmath::perspective(cgmath::Deg(90.0), 1.0, 0.5, 20.0),
            bake_nearz: 0.5,
            bake_farz: 20.0,
        }
    }

    #[test]
    fn test_clip_to_viewport() {
        assert_eq!(clip_to_viewport([0.5, 0.5], [0.0, 0.0]), Some((0.0, 1.0)));
        let (lo, hi) = clip_to_viewport([-0.5, 0.5], [2.0, 0.0]).expect("crosses");
        assert!((lo - 0.25).abs() < 1e-6 && (hi - 0.75).abs() < 1e-6);
        assert_eq!(clip_to_viewport([1.5, 0.5], [1.0, 0.0]), None);
    }

    #[test]
    fn test_same_camera_ray_is_a_point() {
        let snapshot = identity_snapshot();
        let live = CameraFrame {
            view: snapshot.bake_view,
            projection: snapshot.bake_projection,
            near_plane: 0.5,
            far_plane: 20.0,
        };
        let transform = build_ray_transform(&live, &snapshot).expect("invertible");
        let ray = generate_ray(&transform, &snapshot, (3, 5), (8, 8)).expect("ray");
        // Viewed from the baking camera a ray collapses onto its own pixel
        assert!(ray.du[0].abs() < 1e-4 && ray.du[1].abs() < 1e-4);
        assert!((ray.u0[0] - 3.5 / 8.0).abs() < 1e-4);
        assert!((ray.u0[1] - 5.5 / 8.0).abs() < 1e-4);
        assert!((ray.depth(0.0) - 0.5).abs() < 1e-3);
        assert!((ray.depth(1.0) - 20.0).abs() < 1e-2);
    }

    #[test]
    fn test_first_in_slab() {
        let ray = BakedRay {
            u0: [0.5, 0.5],
            du: [0.0, 0.0],
            inv_z0: 1.0,
            inv_z1: 0.1,
            s_start: 0.0,
            s_end: 1.0,
        };
        // depth 2 -> inverse 0.5 at s = 5/9
        let s = first_in_slab(&ray, 0.0, 1.0, 2.0, 0.0).expect("hit");
        assert!((s - 5.0 / 9.0).abs() < 1e-5);
        assert!(first_in_slab(&ray, 0.0, 0.5, 2.0, 0.0).is_none());
        assert!(first_in_slab(&ray, 0.0, 1.0, 50.0, 0.1).is_none());
    }
}
