//! GPU renderer operations
//!
//! A rebuild frame runs: clear heads, build pass, layer-0 compaction, one
//! downsample dispatch per pyramid level. The display pass then draws either the
//! layer heat-map or, while the preview is armed, the trace plus the baked frustum.

use super::programs::create_programs;
use super::renderer_data::{
    FrameUniform, GpuVertex, HeapResources, ObjectUniform, Programs, Renderer, SceneBuffers,
};
use super::resources::{create_heap_resources, SharedBindings};
use crate::camera::CameraFrame;
use crate::config::RendererConfig;
use crate::constants::gpu::{INITIAL_OBJECT_SLOTS, OBJECT_UNIFORM_STRIDE, WORKGROUP_EDGE};
use crate::constants::heap::FIRST_NODE;
use crate::constants::workgroups_for;
use crate::diagnostics::{log_frame_diagnostics, DiagnosticsCounters, FrameDiagnostics};
use crate::error::{ErrorContext, HiabError, HiabResult};
use crate::fragments::raster::normal_matrix;
use crate::gpu::{create_checked, GpuContext};
use crate::heap::{compute_heap_info, ensure_epoch, heap_info_uniform, HeapEpoch, HeapInfo};
use crate::hierarchy::{hierarchy_level_count, level_extent};
use crate::overlay::{frustum_edges_in_live_clip, OverlayVertex, FRUSTUM_EDGES};
use crate::scene::Scene;
use crate::trace::{
    build_ray_transform, trace_uniform, BakedSnapshot, FramePlan, TracePreview, TraceUniform,
};
use cgmath::Matrix4;
use parking_lot::RwLock;
use std::num::NonZeroU64;
use std::sync::Arc;

const INITIAL_VERTEX_CAPACITY: u64 = 4096;
const OVERLAY_VERTEX_COUNT: u64 = FRUSTUM_EDGES.len() as u64 * 2;

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    size: u64,
    usage: wgpu::BufferUsages,
) -> HiabResult<wgpu::Buffer> {
    create_checked(device, label, size, || {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    })
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: u64) -> HiabResult<wgpu::Buffer> {
    create_buffer(
        device,
        "scene vertices",
        capacity * std::mem::size_of::<GpuVertex>() as u64,
        wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    )
}

fn create_object_buffer(device: &wgpu::Device, slots: u64) -> HiabResult<wgpu::Buffer> {
    create_buffer(
        device,
        "object uniforms",
        slots * OBJECT_UNIFORM_STRIDE,
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    )
}

fn create_build_group(
    device: &wgpu::Device,
    programs: &Programs,
    frame: &wgpu::Buffer,
    counters: &wgpu::Buffer,
    objects: &wgpu::Buffer,
    resources: &HeapResources,
) -> HiabResult<wgpu::BindGroup> {
    let build = &programs.build;
    build.slots.create_bind_group(
        device,
        &build.bind_group_layout,
        "fragment_build",
        vec![
            ("frame", frame.as_entire_binding()),
            (
                "object",
                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: objects,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<ObjectUniform>() as u64),
                }),
            ),
            ("heads", resources.heads.as_entire_binding()),
            ("counters", counters.as_entire_binding()),
            ("nodes", wgpu::BindingResource::TextureView(&resources.nodes_view)),
        ],
    )
}

fn size_heap(
    config: &RendererConfig,
    viewport: (u32, u32),
    epoch: HeapEpoch,
) -> HiabResult<(HeapInfo, u32)> {
    let info = compute_heap_info(viewport.0, viewport.1, config.avg_layers_per_pixel, epoch)?;
    let levels = hierarchy_level_count(viewport.0, viewport.1, config.max_hierarchy_levels);
    Ok((info, levels))
}

fn frame_uniform(info: &HeapInfo, level_count: u32, clear_color: [f32; 4]) -> FrameUniform {
    let heap = heap_info_uniform(info);
    FrameUniform {
        heap_size: heap.size,
        heap_width: heap.width,
        x_mask: heap.x_mask,
        y_shift: heap.y_shift,
        viewport: [info.viewport.0, info.viewport.1],
        level_count,
        _padding: 0,
        clear_color,
    }
}

fn object_uniform(transform: &Matrix4<f32>, camera: &CameraFrame) -> ObjectUniform {
    let normals = normal_matrix(transform);
    let normal_matrix = Matrix4::from_cols(
        normals.x.extend(0.0),
        normals.y.extend(0.0),
        normals.z.extend(0.0),
        cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0),
    );
    ObjectUniform {
        mvp: (camera.projection * camera.view * transform).into(),
        normal_matrix: normal_matrix.into(),
    }
}

fn wgpu_color([r, g, b, a]: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

impl Renderer {
    /// Compile every program and allocate storage for `viewport`; the display pass
    /// writes views of `target_format`
    pub fn new(
        context: Arc<GpuContext>,
        config: RendererConfig,
        viewport: (u32, u32),
        target_format: wgpu::TextureFormat,
    ) -> HiabResult<Self> {
        config.validate()?;
        context.recovery.ensure_device()?;
        let device = &context.device;
        let viewport = (viewport.0.max(1), viewport.1.max(1));
        let epoch = HeapEpoch(0);

        let programs = create_programs(device, target_format)?;
        let frame_buffer = create_buffer(
            device,
            "frame uniform",
            std::mem::size_of::<FrameUniform>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        let trace_buffer = create_buffer(
            device,
            "trace uniform",
            std::mem::size_of::<TraceUniform>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        let counters_size = std::mem::size_of::<DiagnosticsCounters>() as u64;
        let counters = create_buffer(
            device,
            "allocation counters",
            counters_size,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        )?;
        let counters_readback = create_buffer(
            device,
            "allocation counters readback",
            counters_size,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        )?;
        let overlay_vertices = create_buffer(
            device,
            "frustum overlay",
            OVERLAY_VERTEX_COUNT * std::mem::size_of::<OverlayVertex>() as u64,
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        )?;
        let scene = SceneBuffers {
            vertices: create_vertex_buffer(device, INITIAL_VERTEX_CAPACITY)?,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            objects: create_object_buffer(device, INITIAL_OBJECT_SLOTS)?,
            object_slots: INITIAL_OBJECT_SLOTS,
            draws: Vec::new(),
        };

        let (info, level_count) = size_heap(&config, viewport, epoch)?;
        let resources = create_heap_resources(
            &context,
            &programs,
            SharedBindings {
                frame: &frame_buffer,
                trace: &trace_buffer,
                counters: &counters,
            },
            info,
            level_count,
        )?;
        let build_group = create_build_group(
            device,
            &programs,
            &frame_buffer,
            &counters,
            &scene.objects,
            &resources,
        )?;

        log::info!(
            "[Renderer::new] {}x{} viewport on {}, heap capacity {}, {} levels",
            viewport.0,
            viewport.1,
            context.adapter_info.name,
            info.capacity,
            level_count
        );

        Ok(Self {
            preview: TracePreview::new(config.default_trace_iterations, config.max_trace_iterations),
            diagnostics: Arc::new(RwLock::new(FrameDiagnostics::default())),
            pending_viewport: None,
            frame_index: 0,
            last_rebuilt: false,
            context,
            config,
            target_format,
            programs,
            frame_buffer,
            trace_buffer,
            counters,
            counters_readback,
            overlay_vertices,
            scene,
            build_group,
            resources,
            viewport,
            epoch,
        })
    }

    /// Record a viewport change; storage is reallocated at the next frame start
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        let requested = (width.max(1), height.max(1));
        self.pending_viewport = (requested != self.viewport).then_some(requested);
    }

    /// Reallocate all viewport-sized storage if a change is pending
    pub fn apply_viewport_changes(&mut self) -> HiabResult<bool> {
        let Some(viewport) = self.pending_viewport.take() else {
            return Ok(false);
        };

        let epoch = HeapEpoch(self.epoch.0.wrapping_add(1));
        let (info, level_count) = size_heap(&self.config, viewport, epoch)?;
        self.preview.disarm_for_resize();

        let resources = create_heap_resources(
            &self.context,
            &self.programs,
            SharedBindings {
                frame: &self.frame_buffer,
                trace: &self.trace_buffer,
                counters: &self.counters,
            },
            info,
            level_count,
        )?;
        self.build_group = create_build_group(
            &self.context.device,
            &self.programs,
            &self.frame_buffer,
            &self.counters,
            &self.scene.objects,
            &resources,
        )?;
        self.resources = resources;
        self.viewport = viewport;
        self.epoch = epoch;

        log::info!(
            "[Renderer::apply_viewport_changes] {}x{}, capacity {}, epoch {}",
            viewport.0,
            viewport.1,
            info.capacity,
            epoch.0
        );
        Ok(true)
    }

    /// Upload vertices and per-object uniforms, growing the buffers when needed
    fn upload_scene(&mut self, scene: &Scene, camera: &CameraFrame) -> HiabResult<()> {
        let device = &self.context.device;
        let queue = &self.context.queue;

        let mut vertices = Vec::new();
        let mut uniforms = Vec::new();
        self.scene.draws.clear();
        for object in &scene.objects {
            let first = vertices.len() as u32;
            let triangles = object.positions.len() / 3;
            vertices.extend(
                object.positions[..triangles * 3]
                    .iter()
                    .zip(object.normals.iter().chain(std::iter::repeat(&[0.0; 3])))
                    .map(|(&position, &normal)| GpuVertex { position, normal }),
            );
            self.scene.draws.push(first..vertices.len() as u32);

            let mut slot = [0u8; OBJECT_UNIFORM_STRIDE as usize];
            let uniform = object_uniform(&object.transform, camera);
            slot[..std::mem::size_of::<ObjectUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
            uniforms.extend_from_slice(&slot);
        }

        let vertex_count = vertices.len() as u64;
        if vertex_count > self.scene.vertex_capacity {
            let capacity = vertex_count.next_power_of_two();
            self.scene.vertices = create_vertex_buffer(device, capacity)?;
            self.scene.vertex_capacity = capacity;
            log::debug!("[Renderer] Vertex buffer grown to {} vertices", capacity);
        }
        let object_count = scene.objects.len() as u64;
        if object_count > self.scene.object_slots {
            let slots = object_count.next_power_of_two();
            self.scene.objects = create_object_buffer(device, slots)?;
            self.scene.object_slots = slots;
            self.build_group = create_build_group(
                device,
                &self.programs,
                &self.frame_buffer,
                &self.counters,
                &self.scene.objects,
                &self.resources,
            )?;
            log::debug!("[Renderer] Object buffer grown to {} slots", slots);
        }

        if !vertices.is_empty() {
            queue.write_buffer(&self.scene.vertices, 0, bytemuck::cast_slice(&vertices));
        }
        if !uniforms.is_empty() {
            queue.write_buffer(&self.scene.objects, 0, &uniforms);
        }
        Ok(())
    }

    /// Clear heads, link every sample, compact level 0 and downsample the pyramid
    fn encode_rebuild(&self, encoder: &mut wgpu::CommandEncoder) {
        let resources = &self.resources;
        let (width, height) = self.viewport;
        encoder.clear_buffer(&resources.heads, 0, None);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fragment build"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &resources.build_target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.programs.build.pipeline);
            pass.set_vertex_buffer(0, self.scene.vertices.slice(..));
            for (index, draw) in self.scene.draws.iter().enumerate() {
                if draw.is_empty() {
                    continue;
                }
                let offset = (index as u64 * OBJECT_UNIFORM_STRIDE) as u32;
                pass.set_bind_group(0, &self.build_group, &[offset]);
                pass.draw(draw.clone(), 0..1);
            }
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("layer0 compact"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.programs.compact.pipeline);
            pass.set_bind_group(0, &resources.compact_group, &[]);
            pass.dispatch_workgroups(
                workgroups_for(width, WORKGROUP_EDGE),
                workgroups_for(height, WORKGROUP_EDGE),
                1,
            );
        }

        for (index, group) in resources.downsample_groups.iter().enumerate() {
            let (level_width, level_height) = level_extent(width, height, index as u32 + 1);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("range downsample"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.programs.downsample.pipeline);
            pass.set_bind_group(0, group, &[]);
            pass.dispatch_workgroups(
                workgroups_for(level_width, WORKGROUP_EDGE),
                workgroups_for(level_height, WORKGROUP_EDGE),
                1,
            );
        }
    }

    /// Upload the trace uniform and the overlay; returns the overlay vertex count
    fn prepare_trace(&self, camera: &CameraFrame, snapshot: &BakedSnapshot) -> HiabResult<u32> {
        ensure_epoch(self.epoch, self.resources.info.epoch)?;
        let transform = build_ray_transform(camera, snapshot)?;
        let params = self.preview.march_params(self.config.fragment_thickness);
        let uniform = trace_uniform(
            &transform,
            snapshot,
            &params,
            self.viewport,
            self.resources.level_count,
        );
        let queue = &self.context.queue;
        queue.write_buffer(&self.trace_buffer, 0, bytemuck::bytes_of(&uniform));

        let overlay = frustum_edges_in_live_clip(snapshot, camera);
        if !overlay.is_empty() {
            queue.write_buffer(&self.overlay_vertices, 0, bytemuck::cast_slice(&overlay));
        }
        Ok(overlay.len() as u32)
    }

    /// Run one frame into `target`: apply pending changes, rebuild unless the
    /// preview is armed, then draw the trace or the layer heat-map
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &CameraFrame,
        target: &wgpu::TextureView,
    ) -> HiabResult<FramePlan> {
        self.context.recovery.ensure_device()?;
        self.apply_viewport_changes()?;

        let plan = self.preview.begin_frame(camera);
        let queue = Arc::clone(&self.context.queue);
        let frame = frame_uniform(
            &self.resources.info,
            self.resources.level_count,
            self.config.clear_color,
        );
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hiab frame"),
            });

        if plan.rebuild {
            self.upload_scene(scene, camera)?;
            let reset = DiagnosticsCounters {
                node_alloc_pointer: FIRST_NODE,
                depth_alloc_pointer: FIRST_NODE,
                truncated_pixels: 0,
                _padding: 0,
            };
            queue.write_buffer(&self.counters, 0, bytemuck::bytes_of(&reset));
            self.encode_rebuild(&mut encoder);
        }

        let overlay_vertices = match &plan.trace {
            Some(snapshot) => Some(self.prepare_trace(camera, snapshot)?),
            None => None,
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("display"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu_color(self.config.clear_color)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            match overlay_vertices {
                Some(count) => {
                    pass.set_pipeline(&self.programs.trace.pipeline);
                    pass.set_bind_group(0, &self.resources.trace_group, &[]);
                    pass.draw(0..3, 0..1);
                    if count > 0 {
                        pass.set_pipeline(&self.programs.overlay);
                        pass.set_vertex_buffer(0, self.overlay_vertices.slice(..));
                        pass.draw(0..count, 0..1);
                    }
                }
                None => {
                    pass.set_pipeline(&self.programs.heatmap.pipeline);
                    pass.set_bind_group(0, &self.resources.heatmap_group, &[]);
                    pass.draw(0..3, 0..1);
                }
            }
        }

        queue.submit(Some(encoder.finish()));
        self.last_rebuilt = plan.rebuild;
        self.frame_index += 1;
        Ok(plan)
    }

    /// Copy the allocation counters back and publish the last frame's diagnostics.
    /// Blocks until the GPU has finished the frame.
    pub fn read_diagnostics(&self) -> HiabResult<FrameDiagnostics> {
        let device = &self.context.device;
        let size = std::mem::size_of::<DiagnosticsCounters>() as u64;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("counters readback"),
        });
        encoder.copy_buffer_to_buffer(&self.counters, 0, &self.counters_readback, 0, size);
        self.context.queue.submit(Some(encoder.finish()));

        let slice = self.counters_readback.slice(..);
        let (sender, receiver) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .context("counters readback channel")?
            .map_err(|_| HiabError::BufferMappingFailed {
                operation: "counters map_async".to_string(),
            })?;

        let data = slice.get_mapped_range();
        let counters = *bytemuck::from_bytes::<DiagnosticsCounters>(&data);
        drop(data);
        self.counters_readback.unmap();

        let (width, height) = self.viewport;
        let level_count = self.resources.level_count;
        let diagnostics = FrameDiagnostics::from_counters(
            self.frame_index.saturating_sub(1),
            &self.resources.info,
            &counters,
            level_count,
            level_count < hierarchy_level_count(width, height, u32::MAX),
            self.last_rebuilt,
        );
        log_frame_diagnostics(&diagnostics);
        *self.diagnostics.write() = diagnostics;
        Ok(diagnostics)
    }

    pub fn set_trace_armed(&mut self, armed: bool) {
        self.preview.request_armed(armed);
    }

    pub fn toggle_trace(&mut self) -> bool {
        self.preview.toggle()
    }

    pub fn set_iteration_budget(&mut self, budget: u32) -> u32 {
        self.preview.set_iteration_budget(budget)
    }

    /// Diagnostics published by the last `read_diagnostics`
    pub fn diagnostics(&self) -> FrameDiagnostics {
        *self.diagnostics.read()
    }

    pub fn diagnostics_handle(&self) -> Arc<RwLock<FrameDiagnostics>> {
        Arc::clone(&self.diagnostics)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn heap_info(&self) -> &HeapInfo {
        &self.resources.info
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    pub fn preview(&self) -> &TracePreview {
        &self.preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{build_camera_frame, CameraData};
    use cgmath::{SquareMatrix, Vector3};

    #[test]
    fn test_frame_uniform_mirrors_heap_addressing() {
        let info = compute_heap_info(64, 48, 2, HeapEpoch(3)).expect("heap");
        let frame = frame_uniform(&info, 4, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(frame.heap_size, info.capacity);
        assert_eq!(frame.heap_width, info.storage_extent().0);
        assert_eq!(frame.x_mask, info.x_mask);
        assert_eq!(frame.y_shift, info.y_shift);
        assert_eq!(frame.viewport, [64, 48]);
        assert_eq!(frame.level_count, 4);
    }

    #[test]
    fn test_object_uniform_normal_matrix_undoes_scale() {
        let camera = build_camera_frame(&CameraData::default());
        let transform = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let uniform = object_uniform(&transform, &camera);
        let normals = Matrix4::from(uniform.normal_matrix);
        let n = normals * Vector3::new(1.0, 0.0, 0.0).extend(0.0);
        assert!((n.x - 0.5).abs() < 1e-6);
        assert_eq!(n.w, 0.0);

        let identity = object_uniform(&Matrix4::identity(), &camera);
        let mvp = Matrix4::from(identity.mvp);
        assert_eq!(mvp, camera.projection * camera.view);
    }

    #[test]
    fn test_size_heap_respects_level_cap() {
        let config = RendererConfig {
            max_hierarchy_levels: 3,
            ..RendererConfig::default()
        };
        let (info, levels) = size_heap(&config, (256, 256), HeapEpoch(0)).expect("heap");
        assert_eq!(levels, 3);
        assert!(info.capacity >= 2 * 256 * 256);
    }
}
