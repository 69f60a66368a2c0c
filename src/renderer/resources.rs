//! Viewport-sized GPU storage
//!
//! The node heap and the depth arrays share one addressing scheme, so both are
//! 2D textures of `HeapInfo::storage_extent`. The range pyramid is one texture
//! whose mip `l` is level `l`.

use super::renderer_data::{HeapResources, Programs};
use crate::compaction::{DepthSample, RangeEntry};
use crate::constants::gpu::{BUILD_TARGET_FORMAT, DEPTH_ARRAY_FORMAT, NODE_FORMAT, RANGE_FORMAT};
use crate::fragments::GpuFragmentNode;
use crate::error::{HiabError, HiabResult, OptionExt};
use crate::gpu::{create_checked, GpuContext};
use crate::heap::HeapInfo;

/// Buffers that outlive a resize and are bound into the viewport-sized groups
pub struct SharedBindings<'a> {
    pub frame: &'a wgpu::Buffer,
    pub trace: &'a wgpu::Buffer,
    pub counters: &'a wgpu::Buffer,
}

fn storage_texture(
    device: &wgpu::Device,
    label: &str,
    (width, height): (u32, u32),
    mip_level_count: u32,
    format: wgpu::TextureFormat,
    texel_size: usize,
) -> HiabResult<wgpu::Texture> {
    let size = width as u64 * height as u64 * texel_size as u64;
    create_checked(device, label, size, || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    })
}

/// Allocate heads, heaps, pyramid and build target for `info`, and the bind groups
/// that read them
pub fn create_heap_resources(
    context: &GpuContext,
    programs: &Programs,
    shared: SharedBindings<'_>,
    info: HeapInfo,
    level_count: u32,
) -> HiabResult<HeapResources> {
    let device = &context.device;
    let (store_width, store_height) = info.storage_extent();
    let max_dimension = context.max_texture_dimension();
    if store_width > max_dimension || store_height > max_dimension {
        log::error!(
            "[create_heap_resources] {}x{} heap store exceeds the device limit {}",
            store_width,
            store_height,
            max_dimension
        );
        return Err(HiabError::HeapTooLarge {
            capacity_exp: info.capacity_exp,
            max_exp: 2 * max_dimension.ilog2(),
        });
    }
    let viewport = info.viewport;

    let heads_size = (info.pixel_count() * std::mem::size_of::<u32>()) as u64;
    let heads = create_checked(device, "heads", heads_size, || {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("heads"),
            size: heads_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    })?;

    let nodes = storage_texture(
        device,
        "node heap",
        (store_width, store_height),
        1,
        NODE_FORMAT,
        std::mem::size_of::<GpuFragmentNode>(),
    )?;
    let depth_arrays = storage_texture(
        device,
        "depth arrays",
        (store_width, store_height),
        1,
        DEPTH_ARRAY_FORMAT,
        std::mem::size_of::<DepthSample>(),
    )?;
    let ranges = storage_texture(
        device,
        "range pyramid",
        viewport,
        level_count,
        RANGE_FORMAT,
        std::mem::size_of::<RangeEntry>(),
    )?;

    let build_target = create_checked(device, "build target", 0, || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("build target"),
            size: wgpu::Extent3d {
                width: viewport.0,
                height: viewport.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: BUILD_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    })?;

    let nodes_view = nodes.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_arrays_view = depth_arrays.create_view(&wgpu::TextureViewDescriptor::default());
    let ranges_view = ranges.create_view(&wgpu::TextureViewDescriptor::default());
    let build_target_view = build_target.create_view(&wgpu::TextureViewDescriptor::default());
    let level_views: Vec<wgpu::TextureView> = (0..level_count)
        .map(|level| {
            ranges.create_view(&wgpu::TextureViewDescriptor {
                label: Some("range level"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            })
        })
        .collect();
    let range0 = level_views.first().ok_or_hiab(|| HiabError::Internal {
        message: "range pyramid without levels".to_string(),
    })?;

    let compact = &programs.compact;
    let compact_group = compact.slots.create_bind_group(
        device,
        &compact.bind_group_layout,
        "layer0_compact",
        vec![
            ("frame", shared.frame.as_entire_binding()),
            ("heads", heads.as_entire_binding()),
            ("counters", shared.counters.as_entire_binding()),
            ("nodes", wgpu::BindingResource::TextureView(&nodes_view)),
            ("depth_arrays", wgpu::BindingResource::TextureView(&depth_arrays_view)),
            ("range0", wgpu::BindingResource::TextureView(range0)),
        ],
    )?;

    let downsample = &programs.downsample;
    let downsample_groups = level_views
        .windows(2)
        .map(|pair| {
            downsample.slots.create_bind_group(
                device,
                &downsample.bind_group_layout,
                "downsample",
                vec![
                    ("fine_level", wgpu::BindingResource::TextureView(&pair[0])),
                    ("coarse_level", wgpu::BindingResource::TextureView(&pair[1])),
                ],
            )
        })
        .collect::<HiabResult<Vec<_>>>()?;

    let trace = &programs.trace;
    let trace_group = trace.slots.create_bind_group(
        device,
        &trace.bind_group_layout,
        "trace_preview",
        vec![
            ("params", shared.trace.as_entire_binding()),
            ("frame", shared.frame.as_entire_binding()),
            ("ranges", wgpu::BindingResource::TextureView(&ranges_view)),
            ("depth_arrays", wgpu::BindingResource::TextureView(&depth_arrays_view)),
        ],
    )?;

    let heatmap = &programs.heatmap;
    let heatmap_group = heatmap.slots.create_bind_group(
        device,
        &heatmap.bind_group_layout,
        "layer_heatmap",
        vec![
            ("frame", shared.frame.as_entire_binding()),
            ("ranges", wgpu::BindingResource::TextureView(&ranges_view)),
        ],
    )?;

    log::debug!(
        "[create_heap_resources] {}x{} viewport, {}x{} store, {} levels",
        viewport.0,
        viewport.1,
        store_width,
        store_height,
        level_count
    );

    Ok(HeapResources {
        info,
        level_count,
        heads,
        nodes,
        nodes_view,
        depth_arrays,
        depth_arrays_view,
        ranges,
        ranges_view,
        level_views,
        build_target,
        build_target_view,
        compact_group,
        downsample_groups,
        trace_group,
        heatmap_group,
    })
}
