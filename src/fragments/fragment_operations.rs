//! Fragment heap operations
//!
//! The append is the classic lock-free A-buffer insert: fetch-and-increment the
//! allocation pointer, exchange the pixel head, then write the node with the old
//! head as its successor. The exchange is what keeps concurrent appends to the
//! same pixel from losing nodes.

use super::fragment_data::{AppendOutcome, BuildReport, FragmentHeap, FragmentNode, FragmentSample};
use crate::constants::heap::{FIRST_NODE, NULL_NODE};
use crate::heap::{encode, storage_slot, HeapInfo};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

fn atomic_vec(len: usize) -> Vec<AtomicU32> {
    (0..len).map(|_| AtomicU32::new(0)).collect()
}

/// Allocate heads and node storage for a heap configuration
pub fn create_fragment_heap(info: HeapInfo) -> FragmentHeap {
    let slots = info.capacity as usize;
    log::debug!(
        "[create_fragment_heap] {} pixels, {} node slots ({}x{} store)",
        info.pixel_count(),
        slots,
        1u32 << info.width_exp,
        1u32 << info.height_exp
    );
    FragmentHeap {
        heads: atomic_vec(info.pixel_count()),
        next: atomic_vec(slots),
        depth_bits: atomic_vec(slots),
        payload: atomic_vec(slots),
        alloc_pointer: AtomicU32::new(FIRST_NODE),
        info,
    }
}

/// Start of a build pass: clear all heads and reset the allocation pointer.
/// Node contents are left stale; nothing reachable points at them.
pub fn reset_fragment_heap(heap: &mut FragmentHeap) {
    heap.heads
        .par_iter_mut()
        .for_each(|head| *head.get_mut() = NULL_NODE);
    *heap.alloc_pointer.get_mut() = FIRST_NODE;
}

/// Append one fragment to the list of `pixel`
pub fn append_fragment(heap: &FragmentHeap, pixel: u32, depth: f32, payload: u32) -> AppendOutcome {
    let Some(head) = heap.heads.get(pixel as usize) else {
        return AppendOutcome::OutsideViewport;
    };

    let node = heap.alloc_pointer.fetch_add(1, Ordering::Relaxed);
    if node >= heap.info.capacity {
        return AppendOutcome::Dropped;
    }

    let slot = storage_slot(&heap.info, encode(&heap.info, node));
    heap.depth_bits[slot].store(depth.to_bits(), Ordering::Relaxed);
    heap.payload[slot].store(payload, Ordering::Relaxed);
    let previous = head.swap(node, Ordering::AcqRel);
    heap.next[slot].store(previous, Ordering::Relaxed);

    AppendOutcome::Stored(node)
}

fn build_report(heap: &FragmentHeap, requested: usize, rejected: usize) -> BuildReport {
    let allocated = heap
        .alloc_pointer
        .load(Ordering::Acquire)
        .saturating_sub(FIRST_NODE);
    let stored = allocated.min(heap.info.usable_slots());
    let report = BuildReport {
        requested: requested as u32,
        stored,
        dropped: allocated - stored,
        rejected: rejected as u32,
    };
    if report.rejected > 0 {
        log::warn!(
            "[build_heap] {} of {} fragments addressed pixels outside the {}x{} viewport",
            report.rejected,
            report.requested,
            heap.info.viewport.0,
            heap.info.viewport.1
        );
    }
    if report.dropped > 0 {
        log::warn!(
            "[build_heap] Heap capacity {} exhausted: {} of {} fragments dropped",
            heap.info.capacity,
            report.dropped,
            report.requested
        );
    }
    report
}

/// Deterministic single-threaded build
pub fn build_heap_sequential(heap: &FragmentHeap, samples: &[FragmentSample]) -> BuildReport {
    let rejected = samples
        .iter()
        .map(|sample| append_fragment(heap, sample.pixel, sample.depth, sample.payload))
        .filter(|outcome| *outcome == AppendOutcome::OutsideViewport)
        .count();
    build_report(heap, samples.len(), rejected)
}

/// Data-parallel build; list order within a pixel is unspecified
pub fn build_heap_parallel(heap: &FragmentHeap, samples: &[FragmentSample]) -> BuildReport {
    let rejected = samples
        .par_iter()
        .map(|sample| append_fragment(heap, sample.pixel, sample.depth, sample.payload))
        .filter(|outcome| *outcome == AppendOutcome::OutsideViewport)
        .count();
    build_report(heap, samples.len(), rejected)
}

/// Read the node stored at `index`; `None` for the sentinel or out-of-range indices
pub fn read_node(heap: &FragmentHeap, index: u32) -> Option<FragmentNode> {
    if index == NULL_NODE || index >= heap.info.capacity {
        return None;
    }
    let slot = storage_slot(&heap.info, encode(&heap.info, index));
    Some(FragmentNode {
        next: heap.next[slot].load(Ordering::Relaxed),
        depth: f32::from_bits(heap.depth_bits[slot].load(Ordering::Relaxed)),
        payload: heap.payload[slot].load(Ordering::Relaxed),
    })
}

/// Iterator over one pixel's list, most recent node first
pub struct ListWalker<'a> {
    heap: &'a FragmentHeap,
    current: u32,
    remaining: u32,
}

impl<'a> Iterator for ListWalker<'a> {
    type Item = FragmentNode;

    fn next(&mut self) -> Option<Self::Item> {
        // A list can never be longer than the heap; the bound also stops cycles
        // left behind by a torn build.
        if self.remaining == 0 {
            return None;
        }
        let node = read_node(self.heap, self.current)?;
        self.remaining -= 1;
        self.current = node.next;
        Some(node)
    }
}

/// Walk the list rooted at `heads[pixel]`
pub fn walk_list(heap: &FragmentHeap, pixel: u32) -> ListWalker<'_> {
    let current = heap
        .heads
        .get(pixel as usize)
        .map(|h| h.load(Ordering::Acquire))
        .unwrap_or(NULL_NODE);
    ListWalker {
        heap,
        current,
        remaining: heap.info.usable_slots(),
    }
}

/// Number of nodes reachable from `heads[pixel]`
pub fn list_length(heap: &FragmentHeap, pixel: u32) -> u32 {
    walk_list(heap, pixel).count() as u32
}

/// Pack a unit normal into four signed 8-bit lanes (matches WGSL `pack4x8snorm`)
pub fn pack_normal(normal: [f32; 3]) -> u32 {
    let lane = |v: f32| ((v.clamp(-1.0, 1.0) * 127.0).round() as i8) as u8 as u32;
    lane(normal[0]) | (lane(normal[1]) << 8) | (lane(normal[2]) << 16)
}

/// Inverse of [`pack_normal`] (matches WGSL `unpack4x8snorm`)
pub fn unpack_normal(packed: u32) -> [f32; 3] {
    let lane = |shift: u32| ((((packed >> shift) & 0xFF) as u8 as i8) as f32 / 127.0).max(-1.0);
    [lane(0), lane(8), lane(16)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{compute_heap_info, HeapEpoch};

    fn small_heap(width: u32, height: u32) -> FragmentHeap {
        let info = compute_heap_info(width, height, 1, HeapEpoch(0)).expect("heap info");
        create_fragment_heap(info)
    }

    #[test]
    fn test_fresh_heap_is_empty() {
        let heap = small_heap(4, 4);
        for pixel in 0..16 {
            assert_eq!(list_length(&heap, pixel), 0);
        }
        assert_eq!(heap.alloc_pointer.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_append_links_lifo() {
        let heap = small_heap(4, 4);
        assert_eq!(append_fragment(&heap, 5, 1.0, 10), AppendOutcome::Stored(1));
        assert_eq!(append_fragment(&heap, 5, 2.0, 20), AppendOutcome::Stored(2));
        assert_eq!(append_fragment(&heap, 6, 3.0, 30), AppendOutcome::Stored(3));

        let depths: Vec<f32> = walk_list(&heap, 5).map(|n| n.depth).collect();
        assert_eq!(depths, vec![2.0, 1.0]);
        assert_eq!(list_length(&heap, 6), 1);
        assert_eq!(list_length(&heap, 7), 0);
    }

    #[test]
    fn test_reset_clears_heads_and_pointer() {
        let mut heap = small_heap(4, 4);
        append_fragment(&heap, 0, 1.0, 0);
        reset_fragment_heap(&mut heap);
        assert_eq!(list_length(&heap, 0), 0);
        assert_eq!(heap.alloc_pointer.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_overflow_drops_without_corrupting_lists() {
        // 1x1 viewport still gets the minimum 256 slots, 255 usable
        let heap = small_heap(1, 1);
        let samples: Vec<FragmentSample> = (0..300)
            .map(|i| FragmentSample {
                pixel: 0,
                depth: i as f32,
                payload: 0,
            })
            .collect();
        let report = build_heap_sequential(&heap, &samples);
        assert_eq!(report.requested, 300);
        assert_eq!(report.stored, 255);
        assert_eq!(report.dropped, 45);
        assert_eq!(list_length(&heap, 0), 255);
        assert_eq!(heap.alloc_pointer.load(Ordering::Relaxed), 301);
    }

    #[test]
    fn test_parallel_build_keeps_every_fragment() {
        let heap = small_heap(8, 8);
        let samples: Vec<FragmentSample> = (0..120)
            .map(|i| FragmentSample {
                pixel: i % 3,
                depth: i as f32,
                payload: i,
            })
            .collect();
        let report = build_heap_parallel(&heap, &samples);
        assert_eq!(report.stored, 120);
        assert_eq!(list_length(&heap, 0), 40);
        assert_eq!(list_length(&heap, 1), 40);
        assert_eq!(list_length(&heap, 2), 40);

        let mut payloads: Vec<u32> = (0..3).flat_map(|p| walk_list(&heap, p)).map(|n| n.payload).collect();
        payloads.sort_unstable();
        assert_eq!(payloads, (0..120).collect::<Vec<_>>());
    }

    #[test]
    fn test_out_of_viewport_samples_are_counted_not_stored() {
        let heap = small_heap(4, 4);
        assert_eq!(append_fragment(&heap, 16, 1.0, 0), AppendOutcome::OutsideViewport);
        assert_eq!(heap.alloc_pointer.load(Ordering::Relaxed), 1);

        let samples: Vec<FragmentSample> = [3, 99, 7, 16, 3]
            .iter()
            .map(|&pixel| FragmentSample {
                pixel,
                depth: 1.0,
                payload: 0,
            })
            .collect();
        for report in [
            build_heap_sequential(&heap, &samples),
            build_heap_parallel(&small_heap(4, 4), &samples),
        ] {
            assert_eq!(report.requested, 5);
            assert_eq!(report.rejected, 2);
            assert_eq!(report.dropped, 0);
        }
        assert_eq!(list_length(&heap, 3), 2);
        assert_eq!(heap.alloc_pointer.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_normal_packing() {
        let packed = pack_normal([0.0, 1.0, -1.0]);
        let [x, y, z] = unpack_normal(packed);
        assert!(x.abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
        assert!((z + 1.0).abs() < 1e-6);
        assert_eq!(packed >> 24, 0);
    }
}
