/// Hierarchy Module - the downsample pass
///
/// Builds coarser range levels from level 0. Each coarse texel summarizes the
/// texels of the level beneath it that overlap its footprint in normalized screen
/// coordinates, so no coarse cell is ever empty while a covered fine cell is not.

pub mod hierarchy_data;
pub mod hierarchy_operations;

pub use hierarchy_data::RangePyramid;
pub use hierarchy_operations::{
    build_hierarchy, downsample_level, footprint, hierarchy_level_count, level_extent,
    merge_entries, parent_cell,
};
