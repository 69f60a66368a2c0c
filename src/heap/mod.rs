/// Heap Module - bump-allocated fragment heaps with 2D addressing
///
/// - heap_data.rs: `HeapInfo`, `HeapEpoch` and the GPU uniform layout
/// - heap_operations.rs: sizing, `encode`/`decode` between linear index and 2D slot
///
/// Both heaps of a frame (the fragment node heap and the compacted depth heap)
/// share one `HeapInfo`. A viewport change produces a new `HeapInfo` with a new
/// epoch; coordinates from different epochs must never be mixed.

pub mod heap_data;
pub mod heap_operations;

pub use heap_data::{HeapEpoch, HeapInfo, HeapInfoUniform};
pub use heap_operations::{
    compute_heap_info, decode, encode, ensure_epoch, heap_info_uniform, storage_slot,
};
