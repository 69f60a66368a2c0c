/// Reference Module - CPU frame driver
///
/// Runs build, compaction, downsample and the trace preview with the same
/// per-frame semantics as the GPU renderer. Used by the test-suite and for
/// headless inspection where no adapter is available.

pub mod reference_data;
pub mod reference_operations;

pub use reference_data::{FrameOutput, LayerImage, ReferenceRenderer};
