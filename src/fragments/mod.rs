/// Fragments Module - the per-pixel linked-list heap (A-buffer build pass)
///
/// - fragment_data.rs: heap storage, node/sample records, GPU node layout
/// - fragment_operations.rs: atomic append, list walks, sequential/parallel builds
/// - raster.rs: reference rasteriser turning scene triangles into fragment samples
///
/// Index 0 is never a real node; heads hold 0 for an empty pixel and a node's
/// `next` holds 0 at the end of its list.

pub mod fragment_data;
pub mod fragment_operations;
pub mod raster;

pub use fragment_data::{
    AppendOutcome, BuildReport, FragmentHeap, FragmentNode, FragmentSample, GpuFragmentNode,
};
pub use fragment_operations::{
    append_fragment, build_heap_parallel, build_heap_sequential, create_fragment_heap,
    list_length, pack_normal, read_node, reset_fragment_heap, unpack_normal, walk_list,
    ListWalker,
};
pub use raster::{rasterize_object, rasterize_scene};
