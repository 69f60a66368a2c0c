//! GPU renderer data: device-side layouts and owned resources

use crate::config::RendererConfig;
use crate::diagnostics::FrameDiagnostics;
use crate::gpu::{GpuContext, ProgramSlots};
use crate::heap::{HeapEpoch, HeapInfo};
use crate::trace::TracePreview;
use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;
use static_assertions::const_assert_eq;
use std::ops::Range;
use std::sync::Arc;

/// Interleaved vertex of the build pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

const_assert_eq!(std::mem::size_of::<GpuVertex>(), 24);

/// Per-object block, one per `OBJECT_UNIFORM_STRIDE` bytes (`ObjectUniform` in WGSL)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub mvp: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

const_assert_eq!(std::mem::size_of::<ObjectUniform>(), 128);

/// Heap addressing, viewport and colours shared by every pass (`FrameInfo` in WGSL)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniform {
    pub heap_size: u32,
    pub heap_width: u32,
    pub x_mask: u32,
    pub y_shift: u32,
    pub viewport: [u32; 2],
    pub level_count: u32,
    pub _padding: u32,
    pub clear_color: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<FrameUniform>(), 48);

/// A program: its slot registry, bind group layout and pipeline
pub struct GpuProgram<P> {
    pub slots: ProgramSlots,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline: P,
}

pub struct Programs {
    pub build: GpuProgram<wgpu::RenderPipeline>,
    pub compact: GpuProgram<wgpu::ComputePipeline>,
    pub downsample: GpuProgram<wgpu::ComputePipeline>,
    pub trace: GpuProgram<wgpu::RenderPipeline>,
    pub heatmap: GpuProgram<wgpu::RenderPipeline>,
    pub overlay: wgpu::RenderPipeline,
}

/// Everything sized by the viewport; replaced as a whole on resize
pub struct HeapResources {
    pub info: HeapInfo,
    pub level_count: u32,
    pub heads: wgpu::Buffer,
    pub nodes: wgpu::Texture,
    pub nodes_view: wgpu::TextureView,
    pub depth_arrays: wgpu::Texture,
    pub depth_arrays_view: wgpu::TextureView,
    pub ranges: wgpu::Texture,
    /// All levels, read by the trace and the heat-map
    pub ranges_view: wgpu::TextureView,
    /// One view per level, written by compaction and downsample
    pub level_views: Vec<wgpu::TextureView>,
    /// Write-masked colour target of the build pass
    pub build_target: wgpu::Texture,
    pub build_target_view: wgpu::TextureView,
    pub compact_group: wgpu::BindGroup,
    pub downsample_groups: Vec<wgpu::BindGroup>,
    pub trace_group: wgpu::BindGroup,
    pub heatmap_group: wgpu::BindGroup,
}

/// Growable per-frame scene upload
pub struct SceneBuffers {
    pub vertices: wgpu::Buffer,
    pub vertex_capacity: u64,
    pub objects: wgpu::Buffer,
    pub object_slots: u64,
    /// Vertex range of each uploaded object, in draw order
    pub draws: Vec<Range<u32>>,
}

/// wgpu implementation of the A-buffer pipeline
pub struct Renderer {
    pub(crate) context: Arc<GpuContext>,
    pub(crate) config: RendererConfig,
    pub(crate) target_format: wgpu::TextureFormat,
    pub(crate) programs: Programs,
    pub(crate) frame_buffer: wgpu::Buffer,
    pub(crate) trace_buffer: wgpu::Buffer,
    /// `DiagnosticsCounters` layout: node alloc, depth alloc, truncated spans
    pub(crate) counters: wgpu::Buffer,
    pub(crate) counters_readback: wgpu::Buffer,
    pub(crate) overlay_vertices: wgpu::Buffer,
    pub(crate) scene: SceneBuffers,
    /// Build-pass bind group; depends on the heap resources and the object buffer
    pub(crate) build_group: wgpu::BindGroup,
    pub(crate) resources: HeapResources,
    pub(crate) viewport: (u32, u32),
    pub(crate) pending_viewport: Option<(u32, u32)>,
    pub(crate) epoch: HeapEpoch,
    pub(crate) preview: TracePreview,
    pub(crate) diagnostics: Arc<RwLock<FrameDiagnostics>>,
    pub(crate) frame_index: u64,
    /// Whether the last rendered frame re-ran the A-buffer passes
    pub(crate) last_rebuilt: bool,
}
