//! Layer-0 compaction
//!
//! Per pixel: walk the list once to count, reserve `k` slots with a single
//! fetch-and-add, walk again to copy. Reservations past capacity are clamped, so a
//! range entry never points outside the depth arrays.

use super::compaction_data::{CompactionReport, DepthArrays, DepthSample, RangeEntry, RangeLevel};
use crate::constants::heap::FIRST_NODE;
use crate::error::HiabResult;
use crate::fragments::{list_length, walk_list, FragmentHeap};
use crate::heap::{ensure_epoch, HeapInfo};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Allocate the second heap for a heap configuration
pub fn create_depth_arrays(info: HeapInfo) -> DepthArrays {
    let slots = info.capacity as usize;
    DepthArrays {
        depth_bits: (0..slots).map(|_| AtomicU32::new(0)).collect(),
        payload: (0..slots).map(|_| AtomicU32::new(0)).collect(),
        alloc_pointer: AtomicU32::new(FIRST_NODE),
        info,
    }
}

fn compact_pixel(
    heap: &FragmentHeap,
    arrays: &DepthArrays,
    pixel: u32,
    truncated: &AtomicU32,
) -> RangeEntry {
    let count = list_length(heap, pixel);
    if count == 0 {
        return RangeEntry::EMPTY;
    }

    let offset = arrays.alloc_pointer.fetch_add(count, Ordering::Relaxed);
    let available = arrays.info.capacity.saturating_sub(offset);
    let stored = count.min(available);
    if stored < count {
        truncated.fetch_add(1, Ordering::Relaxed);
    }
    if stored == 0 {
        return RangeEntry::EMPTY;
    }

    let mut entry = RangeEntry {
        offset,
        count: stored,
        ..RangeEntry::EMPTY
    };
    for (i, node) in walk_list(heap, pixel).take(stored as usize).enumerate() {
        let slot = offset as usize + i;
        arrays.depth_bits[slot].store(node.depth.to_bits(), Ordering::Relaxed);
        arrays.payload[slot].store(node.payload, Ordering::Relaxed);
        entry.min_depth = entry.min_depth.min(node.depth);
        entry.max_depth = entry.max_depth.max(node.depth);
    }
    entry
}

/// Compact every pixel list of `heap` into `arrays`, producing range level 0
pub fn compact_layer0(
    heap: &FragmentHeap,
    arrays: &mut DepthArrays,
) -> HiabResult<(RangeLevel, CompactionReport)> {
    ensure_epoch(heap.info.epoch, arrays.info.epoch)?;
    *arrays.alloc_pointer.get_mut() = FIRST_NODE;

    let (width, height) = heap.info.viewport;
    let truncated = AtomicU32::new(0);
    let arrays = &*arrays;

    let entries: Vec<RangeEntry> = (0..width * height)
        .into_par_iter()
        .map(|pixel| compact_pixel(heap, arrays, pixel, &truncated))
        .collect();

    let reserved = arrays
        .alloc_pointer
        .load(Ordering::Acquire)
        .saturating_sub(FIRST_NODE);
    let report = CompactionReport {
        reserved,
        written: entries.iter().map(|e| e.count).sum(),
        truncated_pixels: truncated.into_inner(),
    };
    if report.overflowed() {
        log::warn!(
            "[compact_layer0] Depth arrays exhausted: {} pixels truncated, {} of {} slots written",
            report.truncated_pixels,
            report.written,
            report.reserved
        );
    }

    Ok((
        RangeLevel {
            width,
            height,
            entries,
        },
        report,
    ))
}

/// Read one compacted fragment
#[inline]
pub fn read_depth_sample(arrays: &DepthArrays, slot: u32) -> DepthSample {
    let slot = slot as usize;
    DepthSample {
        depth: f32::from_bits(arrays.depth_bits[slot].load(Ordering::Relaxed)),
        payload: arrays.payload[slot].load(Ordering::Relaxed),
    }
}

/// Copy out the span described by a level-0 entry
pub fn read_span(arrays: &DepthArrays, entry: &RangeEntry) -> Vec<DepthSample> {
    (entry.offset..entry.offset + entry.count)
        .map(|slot| read_depth_sample(arrays, slot))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::{append_fragment, create_fragment_heap};
    use crate::heap::{compute_heap_info, HeapEpoch};
    use crate::HiabError;

    fn heap_and_arrays(width: u32, height: u32) -> (FragmentHeap, DepthArrays) {
        let info = compute_heap_info(width, height, 2, HeapEpoch(0)).expect("heap info");
        (create_fragment_heap(info), create_depth_arrays(info))
    }

    #[test]
    fn test_compaction_copies_each_list() {
        let (heap, mut arrays) = heap_and_arrays(4, 4);
        append_fragment(&heap, 0, 3.0, 1);
        append_fragment(&heap, 0, 1.0, 2);
        append_fragment(&heap, 9, 5.0, 3);

        let (level, report) = compact_layer0(&heap, &mut arrays).expect("compaction");
        assert_eq!(report.reserved, 3);
        assert_eq!(report.written, 3);
        assert!(!report.overflowed());

        let first = level.entry(0, 0);
        assert_eq!(first.count, 2);
        assert_eq!(first.min_depth, 1.0);
        assert_eq!(first.max_depth, 3.0);
        let mut depths: Vec<f32> = read_span(&arrays, &first).iter().map(|s| s.depth).collect();
        depths.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(depths, vec![1.0, 3.0]);

        let ninth = level.entry(1, 2);
        assert_eq!(ninth.count, 1);
        assert_eq!(read_span(&arrays, &ninth)[0].payload, 3);
        assert!(level.entry(3, 3).is_empty());
    }

    #[test]
    fn test_spans_start_at_one() {
        let (heap, mut arrays) = heap_and_arrays(2, 2);
        append_fragment(&heap, 3, 1.0, 0);
        let (level, _) = compact_layer0(&heap, &mut arrays).expect("compaction");
        assert_eq!(level.entry(1, 1).offset, 1);
    }

    #[test]
    fn test_epoch_mismatch_is_rejected() {
        let info = compute_heap_info(4, 4, 2, HeapEpoch(1)).expect("heap info");
        let stale = compute_heap_info(4, 4, 2, HeapEpoch(0)).expect("heap info");
        let heap = create_fragment_heap(info);
        let mut arrays = create_depth_arrays(stale);
        match compact_layer0(&heap, &mut arrays) {
            Err(HiabError::AddressingEpochMismatch { expected, found }) => {
                assert_eq!((expected, found), (1, 0));
            }
            other => panic!("expected epoch mismatch, got {:?}", other.map(|r| r.1)),
        }
    }

    #[test]
    fn test_recompaction_resets_allocator() {
        let (heap, mut arrays) = heap_and_arrays(2, 2);
        append_fragment(&heap, 0, 1.0, 0);
        compact_layer0(&heap, &mut arrays).expect("first");
        let (level, report) = compact_layer0(&heap, &mut arrays).expect("second");
        assert_eq!(report.reserved, 1);
        assert_eq!(level.entry(0, 0).offset, 1);
    }
}
