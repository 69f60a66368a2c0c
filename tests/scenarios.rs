//! End-to-end frames through the reference renderer

use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};
use hiab::camera::{build_camera_frame, init_camera_looking_at, update_aspect_ratio, CameraFrame};
use hiab::fragments::list_length;
use hiab::heap::{compute_heap_info, decode, encode, HeapEpoch};
use hiab::scene::{create_box_object, create_object, create_quad_object, set_object_transform};
use hiab::trace::{build_ray_transform, generate_ray, march_ray, march_ray_level0, MarchParams};
use hiab::{FrameOutput, RendererConfig, ReferenceRenderer, Scene};

fn camera_at(position: Point3<f32>, viewport: (u32, u32)) -> CameraFrame {
    let camera = init_camera_looking_at(position, Point3::new(0.0, 0.0, 0.0));
    build_camera_frame(&update_aspect_ratio(&camera, viewport.0, viewport.1))
}

#[test]
fn test_scenario_a_heap_sizing() {
    let info = compute_heap_info(100, 100, 2, HeapEpoch(0)).expect("heap");
    assert_eq!(info.capacity, 32768);
    assert_eq!(info.capacity_exp, 15);
    assert_eq!((info.width_exp, info.height_exp), (8, 7));
    assert_eq!(info.x_mask, 255);
    assert_eq!(info.y_shift, 8);
    for index in [0, 1, 255, 256, 20000, 32767] {
        let (x, y) = encode(&info, index);
        assert_eq!(decode(&info, x, y), index);
    }
}

#[test]
fn test_scenario_b_one_pixel_drawn_three_times() {
    // Identity camera: clip == NDC, every sample at depth 1. In 8x8 the triangle
    // only covers the centre of pixel (3, 4).
    let camera = CameraFrame {
        view: Matrix4::identity(),
        projection: Matrix4::identity(),
        near_plane: 0.25,
        far_plane: 50.0,
    };
    let triangle = |name: &str| {
        create_object(
            name,
            vec![[-0.2, -0.2, 0.0], [0.0, -0.2, 0.0], [-0.2, 0.0, 0.0]],
            None,
        )
        .expect("triangle")
    };
    let scene = Scene::with_objects(vec![triangle("a"), triangle("b"), triangle("c")]);

    let mut renderer = ReferenceRenderer::new(RendererConfig::default(), (8, 8))
        .expect("renderer")
        .with_sequential_build(true);
    let FrameOutput::Layers(layers) = renderer.render_frame(&scene, &camera).expect("frame")
    else {
        panic!("inactive preview shows layers");
    };

    for y in 0..8 {
        for x in 0..8 {
            let expected = if (x, y) == (3, 4) { 3 } else { 0 };
            assert_eq!(layers.count(x, y), expected, "pixel ({}, {})", x, y);
            assert_eq!(list_length(renderer.fragment_heap(), y * 8 + x), expected);
        }
    }
    let diagnostics = renderer.diagnostics();
    assert_eq!(diagnostics.fragments_stored, 3);
    assert!(!diagnostics.overflowed);
}

#[test]
fn test_scenario_c_bake_ignores_scene_changes() {
    let viewport = (24, 18);
    let mut scene = Scene::with_objects(vec![
        create_box_object("box", [0.7, 0.5, 0.6]),
        create_quad_object("backdrop", [-4.0, -4.0], [4.3, 4.1], -1.5),
    ]);
    let bake_camera = camera_at(Point3::new(0.4, 0.8, 4.0), viewport);
    let live_camera = camera_at(Point3::new(1.2, 0.5, 3.6), viewport);

    let mut renderer = ReferenceRenderer::new(RendererConfig::default(), viewport).expect("renderer");
    renderer.set_trace_armed(true);
    let FrameOutput::Trace(before) = renderer.render_frame(&scene, &bake_camera).expect("arm")
    else {
        panic!("arming frame traces");
    };
    assert!(before.hit_count() > 0);

    let baked = renderer.layer_image();
    let Some(object) = scene.find_mut("box") else {
        panic!("box in scene");
    };
    set_object_transform(object, Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0)));

    let FrameOutput::Trace(same_view) = renderer.render_frame(&scene, &bake_camera).expect("armed")
    else {
        panic!("armed frame traces");
    };
    assert_eq!(same_view, before);
    assert_eq!(renderer.layer_image(), baked);

    let FrameOutput::Trace(moved) = renderer.render_frame(&scene, &live_camera).expect("armed")
    else {
        panic!("armed frame traces");
    };
    let FrameOutput::Trace(moved_again) = renderer
        .render_frame(&Scene::default(), &live_camera)
        .expect("armed")
    else {
        panic!("armed frame traces");
    };
    assert_eq!(moved, moved_again);
    assert!(!renderer.diagnostics().rebuilt);

    renderer.set_trace_armed(false);
    let FrameOutput::Layers(_) = renderer.render_frame(&scene, &bake_camera).expect("disarm")
    else {
        panic!("disarmed frame shows layers");
    };
    assert!(renderer.diagnostics().rebuilt);
    assert_ne!(renderer.layer_image(), baked);
}

#[test]
fn test_hierarchical_march_matches_level0() {
    let viewport = (32, 32);
    let scene = Scene::with_objects(vec![
        create_box_object("box", [0.6, 0.45, 0.55]),
        create_quad_object("wall", [-3.1, -2.7], [2.9, 3.3], -2.2),
        create_quad_object("card", [0.35, -0.9], [1.45, 0.15], 0.9),
    ]);
    let bake_camera = camera_at(Point3::new(0.3, 0.6, 4.2), viewport);

    let mut renderer = ReferenceRenderer::new(RendererConfig::default(), viewport).expect("renderer");
    renderer.set_trace_armed(true);
    renderer.render_frame(&scene, &bake_camera).expect("bake");
    let Ok(snapshot) = renderer.preview().snapshot() else {
        panic!("preview armed");
    };
    let pyramid = renderer.pyramid();
    assert!(pyramid.level_count() > 1);

    let params = MarchParams {
        iteration_budget: 1 << 20,
        fragment_thickness: renderer.config().fragment_thickness,
    };
    let mut hits = 0;
    for live_position in [Point3::new(0.3, 0.6, 4.2), Point3::new(1.7, 1.1, 3.1)] {
        let live = camera_at(live_position, viewport);
        let transform = build_ray_transform(&live, snapshot).expect("transform");
        for y in 0..viewport.1 {
            for x in 0..viewport.0 {
                let Some(ray) = generate_ray(&transform, snapshot, (x, y), viewport) else {
                    continue;
                };
                let fast = march_ray(&ray, pyramid, renderer.depth_arrays(), &params);
                let exact = march_ray_level0(&ray, pyramid, renderer.depth_arrays(), &params);
                assert!(!fast.exhausted && !exact.exhausted);
                match (fast.hit, exact.hit) {
                    (None, None) => {}
                    (Some(a), Some(b)) => {
                        assert!((a.depth - b.depth).abs() < 1e-4, "pixel ({}, {})", x, y);
                        assert_eq!(a.payload, b.payload);
                        hits += 1;
                    }
                    (a, b) => panic!("pixel ({}, {}): {:?} vs {:?}", x, y, a, b),
                }
            }
        }
    }
    assert!(hits > 0);
}
