//! Pipeline construction
//!
//! Every program's WGSL is its generated slot header, the shared prelude and the
//! pass body. Creation runs inside error scopes so a bad shader fails construction.

use super::renderer_data::{GpuProgram, GpuVertex, ObjectUniform, Programs};
use crate::constants::gpu::{
    BUILD_TARGET_FORMAT, DEPTH_ARRAY_FORMAT, NODE_FORMAT, OBJECT_UNIFORM_STRIDE, RANGE_FORMAT,
};
use crate::error::HiabResult;
use crate::gpu::{
    create_checked, storage_binding, storage_texture_binding, uint_texture_binding,
    uniform_binding, ProgramSlots,
};
use crate::overlay::OverlayVertex;
use wgpu::ShaderStages;

const COMMON_WGSL: &str = include_str!("../shaders/common.wgsl");
const FRAGMENT_BUILD_WGSL: &str = include_str!("../shaders/fragment_build.wgsl");
const LAYER0_COMPACT_WGSL: &str = include_str!("../shaders/layer0_compact.wgsl");
const DOWNSAMPLE_WGSL: &str = include_str!("../shaders/downsample.wgsl");
const TRACE_PREVIEW_WGSL: &str = include_str!("../shaders/trace_preview.wgsl");
const LAYER_HEATMAP_WGSL: &str = include_str!("../shaders/layer_heatmap.wgsl");
const FRUSTUM_OVERLAY_WGSL: &str = include_str!("../shaders/frustum_overlay.wgsl");

fn shader_module(
    device: &wgpu::Device,
    slots: &ProgramSlots,
    body: &str,
) -> HiabResult<wgpu::ShaderModule> {
    let source = format!("{}\n{}\n{}", slots.generate_wgsl(), COMMON_WGSL, body);
    create_checked(device, slots.program(), source.len() as u64, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(slots.program()),
            source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
        })
    })
}

fn pipeline_layout(
    device: &wgpu::Device,
    label: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        push_constant_ranges: &[],
    })
}

fn compute_program(
    device: &wgpu::Device,
    slots: ProgramSlots,
    body: &str,
) -> HiabResult<GpuProgram<wgpu::ComputePipeline>> {
    let module = shader_module(device, &slots, body)?;
    let bind_group_layout = slots.create_layout(device);
    let layout = pipeline_layout(device, slots.program(), &[&bind_group_layout]);
    let pipeline = create_checked(device, slots.program(), 0, || {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(slots.program()),
            layout: Some(&layout),
            module: &module,
            entry_point: "cs_main",
        })
    })?;
    log::debug!("[Programs] Compute program '{}' ready", slots.program());
    Ok(GpuProgram {
        slots,
        bind_group_layout,
        pipeline,
    })
}

/// Fullscreen-triangle program writing the screen target
fn fullscreen_program(
    device: &wgpu::Device,
    slots: ProgramSlots,
    body: &str,
    target_format: wgpu::TextureFormat,
) -> HiabResult<GpuProgram<wgpu::RenderPipeline>> {
    let module = shader_module(device, &slots, body)?;
    let bind_group_layout = slots.create_layout(device);
    let layout = pipeline_layout(device, slots.program(), &[&bind_group_layout]);
    let pipeline = create_checked(device, slots.program(), 0, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(slots.program()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
        })
    })?;
    log::debug!("[Programs] Fullscreen program '{}' ready", slots.program());
    Ok(GpuProgram {
        slots,
        bind_group_layout,
        pipeline,
    })
}

fn build_program(device: &wgpu::Device) -> HiabResult<GpuProgram<wgpu::RenderPipeline>> {
    let mut slots = ProgramSlots::new("fragment_build", 0);
    slots.register("frame", uniform_binding(false), ShaderStages::FRAGMENT, "FrameInfo");
    slots.register("object", uniform_binding(true), ShaderStages::VERTEX, "ObjectUniform");
    slots.register("heads", storage_binding(false), ShaderStages::FRAGMENT, "array<atomic<u32>>");
    slots.register(
        "counters",
        storage_binding(false),
        ShaderStages::FRAGMENT,
        "array<atomic<u32>, 4>",
    );
    slots.register_texture(
        "nodes",
        storage_texture_binding(NODE_FORMAT),
        ShaderStages::FRAGMENT,
    );

    let module = shader_module(device, &slots, FRAGMENT_BUILD_WGSL)?;
    let bind_group_layout = slots.create_layout(device);
    let layout = pipeline_layout(device, slots.program(), &[&bind_group_layout]);
    let vertex_attributes = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    let pipeline = create_checked(device, slots.program(), 0, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(slots.program()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GpuVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &vertex_attributes,
                }],
            },
            // Every sample counts: no culling, no depth test
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: BUILD_TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
            }),
            multiview: None,
        })
    })?;

    debug_assert!(std::mem::size_of::<ObjectUniform>() as u64 <= OBJECT_UNIFORM_STRIDE);
    Ok(GpuProgram {
        slots,
        bind_group_layout,
        pipeline,
    })
}

fn overlay_program(
    device: &wgpu::Device,
    target_format: wgpu::TextureFormat,
) -> HiabResult<wgpu::RenderPipeline> {
    let slots = ProgramSlots::new("frustum_overlay", 0);
    let module = shader_module(device, &slots, FRUSTUM_OVERLAY_WGSL)?;
    let layout = pipeline_layout(device, slots.program(), &[]);
    let attributes = wgpu::vertex_attr_array![0 => Float32x4];

    create_checked(device, slots.program(), 0, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(slots.program()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<OverlayVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
        })
    })
}

/// Create every program of the pipeline
pub fn create_programs(
    device: &wgpu::Device,
    target_format: wgpu::TextureFormat,
) -> HiabResult<Programs> {
    let mut compact = ProgramSlots::new("layer0_compact", 0);
    compact.register("frame", uniform_binding(false), ShaderStages::COMPUTE, "FrameInfo");
    compact.register("heads", storage_binding(true), ShaderStages::COMPUTE, "array<u32>");
    compact.register(
        "counters",
        storage_binding(false),
        ShaderStages::COMPUTE,
        "array<atomic<u32>, 4>",
    );
    compact.register_texture("nodes", uint_texture_binding(), ShaderStages::COMPUTE);
    compact.register_texture(
        "depth_arrays",
        storage_texture_binding(DEPTH_ARRAY_FORMAT),
        ShaderStages::COMPUTE,
    );
    compact.register_texture(
        "range0",
        storage_texture_binding(RANGE_FORMAT),
        ShaderStages::COMPUTE,
    );

    let mut downsample = ProgramSlots::new("downsample", 0);
    downsample.register_texture("fine_level", uint_texture_binding(), ShaderStages::COMPUTE);
    downsample.register_texture(
        "coarse_level",
        storage_texture_binding(RANGE_FORMAT),
        ShaderStages::COMPUTE,
    );

    let mut trace = ProgramSlots::new("trace_preview", 0);
    trace.register("frame", uniform_binding(false), ShaderStages::FRAGMENT, "FrameInfo");
    trace.register("params", uniform_binding(false), ShaderStages::FRAGMENT, "TraceParams");
    trace.register_texture("ranges", uint_texture_binding(), ShaderStages::FRAGMENT);
    trace.register_texture("depth_arrays", uint_texture_binding(), ShaderStages::FRAGMENT);

    let mut heatmap = ProgramSlots::new("layer_heatmap", 0);
    heatmap.register("frame", uniform_binding(false), ShaderStages::FRAGMENT, "FrameInfo");
    heatmap.register_texture("ranges", uint_texture_binding(), ShaderStages::FRAGMENT);

    Ok(Programs {
        build: build_program(device)?,
        compact: compute_program(device, compact, LAYER0_COMPACT_WGSL)?,
        downsample: compute_program(device, downsample, DOWNSAMPLE_WGSL)?,
        trace: fullscreen_program(device, trace, TRACE_PREVIEW_WGSL, target_format)?,
        heatmap: fullscreen_program(device, heatmap, LAYER_HEATMAP_WGSL, target_format)?,
        overlay: overlay_program(device, target_format)?,
    })
}
