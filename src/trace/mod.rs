/// Trace Module - the trace preview (ray-march consumer)
///
/// - trace_data.rs: snapshot, mode state machine, march inputs/outputs, GPU uniform
/// - trace_operations.rs: arm/disarm transitions and per-frame planning
/// - march.rs: live-ray remap into the baked camera and the hierarchical march
///
/// While armed the A-buffer passes are not re-run: the snapshot and the pyramid
/// built in the arming frame stay the reference data until disarmed.

pub mod march;
pub mod trace_data;
pub mod trace_operations;

pub use march::{
    build_ray_transform, clip_to_viewport, generate_ray, march_ray, march_ray_level0,
    shade_sample, trace_image,
};
pub use trace_data::{
    BakedRay, BakedSnapshot, FramePlan, MarchParams, RayTransform, TraceError, TraceHit,
    TraceImage, TraceMode, TracePreview, TraceSample, TraceUniform,
};
pub use trace_operations::trace_uniform;
