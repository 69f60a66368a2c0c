/// Renderer Module - wgpu implementation of the A-buffer pipeline
///
/// - renderer_data.rs: device-side layouts, program and resource bundles, `Renderer`
/// - programs.rs: WGSL assembly and pipeline creation
/// - resources.rs: viewport-sized heaps, range pyramid and their bind groups
/// - renderer_operations.rs: frame scheduling, scene upload, diagnostics readback

pub mod programs;
pub mod renderer_data;
pub mod renderer_operations;
pub mod resources;

pub use programs::create_programs;
pub use renderer_data::{
    FrameUniform, GpuProgram, GpuVertex, HeapResources, ObjectUniform, Programs, Renderer,
    SceneBuffers,
};
pub use resources::{create_heap_resources, SharedBindings};
