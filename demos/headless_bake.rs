//! Headless run of the GPU pipeline: render a few frames of a procedural scene
//! into an offscreen target, arm the trace preview, orbit the live camera and
//! print the allocation counters of every frame.
//!
//! Run with `RUST_LOG=debug` for per-pass logging.

use cgmath::{Matrix4, Point3, Rad, Vector3};
use hiab::camera::{build_camera_frame, init_camera_looking_at, rotate, update_aspect_ratio};
use hiab::scene::{create_box_object, create_quad_object, set_object_transform};
use hiab::{load_config, GpuContext, Renderer, RendererConfig, Scene};
use std::sync::Arc;

const VIEWPORT: (u32, u32) = (640, 480);
const TARGET_FORMAT: hiab::wgpu::TextureFormat = hiab::wgpu::TextureFormat::Rgba8Unorm;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(path)?,
        None => RendererConfig::default(),
    };
    let context = Arc::new(GpuContext::new_headless_blocking()?);
    let mut renderer = Renderer::new(Arc::clone(&context), config, VIEWPORT, TARGET_FORMAT)?;

    let target = context.device.create_texture(&hiab::wgpu::TextureDescriptor {
        label: Some("offscreen target"),
        size: hiab::wgpu::Extent3d {
            width: VIEWPORT.0,
            height: VIEWPORT.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: hiab::wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: hiab::wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let target_view = target.create_view(&hiab::wgpu::TextureViewDescriptor::default());

    let mut scene = Scene::with_objects(vec![
        create_box_object("box", [0.8, 0.6, 0.7]),
        create_box_object("pillar", [0.25, 1.5, 0.25]),
        create_quad_object("backdrop", [-6.0, -4.0], [6.0, 4.0], -3.0),
    ]);
    if let Some(pillar) = scene.find_mut("pillar") {
        set_object_transform(pillar, Matrix4::from_translation(Vector3::new(1.6, 0.0, -1.0)));
    }

    for frame in 0..12u32 {
        if frame == 4 {
            renderer.set_trace_armed(true);
        }
        if frame == 10 {
            renderer.set_trace_armed(false);
        }

        let angle = frame as f32 * 0.15;
        if let Some(object) = scene.find_mut("box") {
            set_object_transform(object, Matrix4::from_angle_y(Rad(angle)));
        }
        let eye = Point3::new(4.5 * angle.sin(), 1.2, 4.5 * angle.cos());
        let mut camera = init_camera_looking_at(eye, Point3::new(0.0, 0.0, 0.0));
        if renderer.preview().is_armed() {
            // Look slightly past the bake so the frustum overlay is in view
            camera = rotate(&camera, 0.1, -0.05);
        }
        let camera = build_camera_frame(&update_aspect_ratio(&camera, VIEWPORT.0, VIEWPORT.1));

        let plan = match renderer.render_frame(&scene, &camera, &target_view) {
            Ok(plan) => plan,
            Err(error) if !error.is_fatal() => {
                log::warn!("[headless_bake] Frame {} skipped: {}", frame, error);
                continue;
            }
            Err(error) => return Err(error.into()),
        };
        let diagnostics = renderer.read_diagnostics()?;
        println!(
            "frame {:2} {:<7} fragments {:>7} / {:<7} avg {:>5.2}/px dropped {:>5} levels {}",
            frame,
            if plan.trace.is_some() { "trace" } else { "layers" },
            diagnostics.fragments_stored,
            diagnostics.capacity,
            diagnostics.avg_fragments_per_pixel,
            diagnostics.fragments_dropped,
            diagnostics.hierarchy_levels,
        );
    }

    Ok(())
}
