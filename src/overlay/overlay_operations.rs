//! Overlay operations

use super::overlay_data::{OverlayVertex, FRUSTUM_EDGES};
use crate::camera::CameraFrame;
use crate::trace::BakedSnapshot;
use cgmath::{Point3, SquareMatrix, Vector4};

/// World-space corners of the baked frustum, `None` if the baked camera is degenerate
pub fn frustum_corners_world(snapshot: &BakedSnapshot) -> Option<[Point3<f32>; 8]> {
    let clip_to_world = (snapshot.bake_projection * snapshot.bake_view).invert()?;
    let mut corners = [Point3::new(0.0, 0.0, 0.0); 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let z = if i < 4 { -1.0 } else { 1.0 };
        let (x, y) = match i % 4 {
            0 => (-1.0, -1.0),
            1 => (1.0, -1.0),
            2 => (1.0, 1.0),
            _ => (-1.0, 1.0),
        };
        let world = clip_to_world * Vector4::new(x, y, z, 1.0);
        *corner = Point3::new(world.x / world.w, world.y / world.w, world.z / world.w);
    }
    Some(corners)
}

/// Twelve frustum edges as a line list in the live camera's clip space
pub fn frustum_edges_in_live_clip(
    snapshot: &BakedSnapshot,
    live: &CameraFrame,
) -> Vec<OverlayVertex> {
    let Some(corners) = frustum_corners_world(snapshot) else {
        log::warn!("[frustum_edges_in_live_clip] Baked camera is degenerate, overlay skipped");
        return Vec::new();
    };
    let world_to_clip = live.projection * live.view;
    let clip = corners.map(|p| world_to_clip * Vector4::new(p.x, p.y, p.z, 1.0));

    FRUSTUM_EDGES
        .iter()
        .flat_map(|&(a, b)| [clip[a], clip[b]])
        .map(|v| OverlayVertex {
            position: v.into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{build_camera_frame, CameraData};
    use cgmath::Matrix4;

    #[test]
    fn test_corners_sit_on_clip_planes() {
        let frame = CameraFrame {
            view: Matrix4::identity(),
            projection: cgmath::perspective(cgmath::Deg(90.0), 1.0, 1.0, 10.0),
            near_plane: 1.0,
            far_plane: 10.0,
        };
        let corners = frustum_corners_world(&BakedSnapshot::capture(&frame)).expect("corners");
        for corner in &corners[..4] {
            assert!((corner.z + 1.0).abs() < 1e-3);
            assert!((corner.x.abs() - 1.0).abs() < 1e-3);
        }
        for corner in &corners[4..] {
            assert!((corner.z + 10.0).abs() < 1e-2);
            assert!((corner.y.abs() - 10.0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_edges_are_a_line_list() {
        let camera = CameraData::default();
        let frame = build_camera_frame(&camera);
        let snapshot = BakedSnapshot::capture(&frame);
        let edges = frustum_edges_in_live_clip(&snapshot, &frame);
        assert_eq!(edges.len(), 24);

        // From the baking camera itself the near-plane corners land on the NDC corners
        let ndc = Vector4::from(edges[0].position);
        let ndc = ndc.truncate() / ndc.w;
        assert!((ndc.x + 1.0).abs() < 1e-3 && (ndc.y + 1.0).abs() < 1e-3);
    }
}
