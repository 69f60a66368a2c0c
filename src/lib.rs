// hiab - hierarchical A-buffer
//
// Every rasterized sample of a frame is kept in a per-pixel linked list (the
// fragment heap), compacted into contiguous per-pixel depth arrays and summarized
// by a pyramid of `{offset, count, min depth, max depth}` ranges. A frozen bake of
// that structure can then be ray-marched from a moving camera.
//
// The pipeline exists twice:
// - reference::ReferenceRenderer runs every pass on the CPU (rayon + atomics)
// - renderer::Renderer runs the same passes on wgpu
// Both share the data layouts, addressing and trace state machine below.

// Constants and ambient
pub mod config;
pub mod constants;
pub mod error;

// Collaborators: camera and scene input
pub mod camera;
pub mod scene;

// A-buffer passes
pub mod compaction;
pub mod fragments;
pub mod heap;
pub mod hierarchy;
pub mod trace;

// Presentation and telemetry
pub mod diagnostics;
pub mod overlay;

// Frame drivers
pub mod gpu;
pub mod reference;
pub mod renderer;

pub use camera::{build_camera_frame, CameraData, CameraFrame};
pub use compaction::{compact_layer0, CompactionReport, DepthArrays, RangeEntry, RangeLevel};
pub use config::{load_config, RendererConfig};
pub use diagnostics::{DiagnosticsCounters, FrameDiagnostics};
pub use error::{ErrorContext, HiabError, HiabResult, OptionExt};
pub use fragments::{FragmentHeap, FragmentSample};
pub use gpu::GpuContext;
pub use heap::{compute_heap_info, HeapEpoch, HeapInfo};
pub use hierarchy::{build_hierarchy, RangePyramid};
pub use reference::{FrameOutput, LayerImage, ReferenceRenderer};
pub use renderer::Renderer;
pub use scene::{Scene, SceneObject};
pub use trace::{
    BakedSnapshot, FramePlan, MarchParams, TraceError, TraceImage, TracePreview, TraceSample,
};

// Re-export wgpu so embedders can create targets with the matching version
pub use wgpu;
