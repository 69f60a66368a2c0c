/// Compaction Module - the layer-0 pass
///
/// Turns every per-pixel linked list into a contiguous span of the depth arrays
/// (second heap) and records `{offset, count}` plus the span's depth bounds in
/// the level-0 range index.

pub mod compaction_data;
pub mod compaction_operations;

pub use compaction_data::{CompactionReport, DepthArrays, DepthSample, RangeEntry, RangeLevel};
pub use compaction_operations::{
    compact_layer0, create_depth_arrays, read_depth_sample, read_span,
};
