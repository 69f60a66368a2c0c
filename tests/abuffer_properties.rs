//! Structural properties of the CPU A-buffer passes

use hiab::compaction::{compact_layer0, create_depth_arrays, read_span, RangeEntry, RangeLevel};
use hiab::constants::heap::FIRST_NODE;
use hiab::diagnostics::{DiagnosticsCounters, FrameDiagnostics};
use hiab::fragments::{
    build_heap_parallel, build_heap_sequential, create_fragment_heap, list_length, walk_list,
    FragmentSample,
};
use hiab::heap::{compute_heap_info, decode, encode, HeapEpoch};
use hiab::hierarchy::{build_hierarchy, footprint, parent_cell};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::Ordering;

fn random_samples(rng: &mut StdRng, pixels: u32, count: usize) -> Vec<FragmentSample> {
    (0..count)
        .map(|_| FragmentSample {
            pixel: rng.gen_range(0..pixels),
            depth: rng.gen_range(0.5f32..40.0),
            payload: rng.gen(),
        })
        .collect()
}

fn per_pixel_counts(samples: &[FragmentSample], pixels: u32) -> Vec<u32> {
    let mut counts = vec![0u32; pixels as usize];
    for sample in samples {
        counts[sample.pixel as usize] += 1;
    }
    counts
}

#[test]
fn test_addressing_is_a_bijection() {
    for (width, height, layers) in [(1, 1, 1), (100, 100, 2), (37, 91, 3), (640, 480, 4)] {
        let info = compute_heap_info(width, height, layers, HeapEpoch(0)).expect("heap");
        let (store_w, store_h) = info.storage_extent();
        let mut seen = vec![false; info.capacity as usize];
        for index in 0..info.capacity {
            let (x, y) = encode(&info, index);
            assert!(x < store_w && y < store_h);
            assert_eq!(decode(&info, x, y), index);
            let linear = (y * store_w + x) as usize;
            assert!(!seen[linear], "two indices share ({}, {})", x, y);
            seen[linear] = true;
        }
    }
}

#[test]
fn test_sequential_lists_hold_every_fragment() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let info = compute_heap_info(24, 16, 4, HeapEpoch(0)).expect("heap");
    let pixels = 24 * 16;
    let samples = random_samples(&mut rng, pixels, 1200);
    let heap = create_fragment_heap(info);

    let report = build_heap_sequential(&heap, &samples);
    assert_eq!(report.dropped, 0);

    let expected = per_pixel_counts(&samples, pixels);
    for pixel in 0..pixels {
        assert_eq!(list_length(&heap, pixel), expected[pixel as usize], "pixel {}", pixel);
    }

    // Sequential appends come back most recent first
    let pixel = samples[0].pixel;
    let depths: Vec<f32> = walk_list(&heap, pixel).map(|node| node.depth).collect();
    let mut appended: Vec<f32> = samples
        .iter()
        .filter(|s| s.pixel == pixel)
        .map(|s| s.depth)
        .collect();
    appended.reverse();
    assert_eq!(depths, appended);
}

#[test]
fn test_compaction_tiles_the_second_heap() {
    let mut rng = StdRng::seed_from_u64(42);
    let info = compute_heap_info(32, 20, 3, HeapEpoch(5)).expect("heap");
    let pixels = 32 * 20;
    let samples = random_samples(&mut rng, pixels, 1500);
    let heap = create_fragment_heap(info);
    build_heap_parallel(&heap, &samples);

    let mut arrays = create_depth_arrays(info);
    let (level0, report) = compact_layer0(&heap, &mut arrays).expect("compaction");
    assert!(!report.overflowed());
    assert_eq!(report.written, samples.len() as u32);

    let expected = per_pixel_counts(&samples, pixels);
    let mut spans: Vec<(u32, u32)> = Vec::new();
    for (pixel, entry) in level0.entries.iter().enumerate() {
        assert_eq!(entry.count, expected[pixel]);
        if entry.count == 0 {
            assert!(entry.is_empty());
            continue;
        }
        spans.push((entry.offset, entry.count));

        let mut from_list: Vec<u32> = walk_list(&heap, pixel as u32)
            .map(|node| node.depth.to_bits())
            .collect();
        let mut from_span: Vec<u32> = read_span(&arrays, entry)
            .iter()
            .map(|sample| sample.depth.to_bits())
            .collect();
        from_list.sort_unstable();
        from_span.sort_unstable();
        assert_eq!(from_list, from_span);
    }

    spans.sort_unstable();
    let mut next = FIRST_NODE;
    for (offset, count) in spans {
        assert_eq!(offset, next, "gap or overlap at {}", offset);
        next += count;
    }
    assert_eq!(next, samples.len() as u32 + FIRST_NODE);
    assert_eq!(arrays.alloc_pointer.load(Ordering::Relaxed), next);
}

#[test]
fn test_hierarchy_never_hides_fragments() {
    let mut rng = StdRng::seed_from_u64(7);
    let (width, height) = (45, 29);
    let mut level0 = RangeLevel::empty(width, height);
    for entry in level0.entries.iter_mut() {
        if rng.gen_bool(0.03) {
            let depth = rng.gen_range(1.0f32..10.0);
            *entry = RangeEntry {
                offset: rng.gen_range(1..1000),
                count: rng.gen_range(1..4),
                min_depth: depth,
                max_depth: depth + 0.5,
            };
        }
    }
    let pyramid = build_hierarchy(level0, 8, HeapEpoch(0));

    for level in 1..pyramid.levels.len() {
        let fine = &pyramid.levels[level - 1];
        let coarse = &pyramid.levels[level];
        for cy in 0..coarse.height {
            for cx in 0..coarse.width {
                let summary = coarse.entry(cx, cy);
                for fy in footprint(cy, coarse.height, fine.height) {
                    for fx in footprint(cx, coarse.width, fine.width) {
                        let child = fine.entry(fx, fy);
                        if child.is_empty() {
                            continue;
                        }
                        assert!(!summary.is_empty(), "level {} ({}, {})", level, cx, cy);
                        assert!(summary.min_depth <= child.min_depth);
                        assert!(summary.max_depth >= child.max_depth);
                        assert!(summary.offset <= child.offset);
                    }
                }
            }
        }
    }
}

#[test]
fn test_single_fragment_marks_its_ancestors() {
    let (width, height) = (64, 48);
    let (px, py) = (37u32, 11u32);
    let mut level0 = RangeLevel::empty(width, height);
    level0.entries[(py * width + px) as usize] = RangeEntry {
        offset: 1,
        count: 1,
        min_depth: 2.0,
        max_depth: 2.0,
    };
    let pyramid = build_hierarchy(level0, 16, HeapEpoch(0));

    let (mut x, mut y) = (px, py);
    for level in 1..pyramid.levels.len() {
        let fine = &pyramid.levels[level - 1];
        let coarse = &pyramid.levels[level];
        x = parent_cell(x, fine.width, coarse.width);
        y = parent_cell(y, fine.height, coarse.height);
        let entry = coarse.entry(x, y);
        assert_eq!(entry.count, 1, "level {}", level);
        assert_eq!(entry.min_depth, 2.0);
    }

    let occupied: usize = pyramid
        .levels
        .iter()
        .map(|level| level.entries.iter().filter(|e| !e.is_empty()).count())
        .sum();
    // 64x48 halves exactly, so only the chain itself is occupied
    assert_eq!(occupied, pyramid.levels.len());
}

#[test]
fn test_capacity_saturation_is_reported() {
    let info = compute_heap_info(4, 4, 1, HeapEpoch(0)).expect("heap");
    assert_eq!(info.capacity, 256);

    for extra in [0u32, 1, 2] {
        let count = info.usable_slots() + extra;
        let samples: Vec<FragmentSample> = (0..count)
            .map(|i| FragmentSample {
                pixel: i % 16,
                depth: 1.0 + i as f32,
                payload: 0,
            })
            .collect();
        let heap = create_fragment_heap(info);
        let report = build_heap_parallel(&heap, &samples);
        let pointer = heap.alloc_pointer.load(Ordering::Relaxed);
        assert_eq!(pointer, info.capacity + extra);
        assert_eq!(report.stored, info.usable_slots());
        assert_eq!(report.dropped, extra);

        let stored: u32 = (0..16).map(|pixel| list_length(&heap, pixel)).sum();
        assert_eq!(stored, info.usable_slots());

        let mut arrays = create_depth_arrays(info);
        let (_, compaction) = compact_layer0(&heap, &mut arrays).expect("compaction");
        let counters = DiagnosticsCounters {
            node_alloc_pointer: pointer,
            depth_alloc_pointer: arrays.alloc_pointer.load(Ordering::Relaxed),
            truncated_pixels: compaction.truncated_pixels,
            _padding: 0,
        };
        let diagnostics = FrameDiagnostics::from_counters(0, &info, &counters, 3, false, true);
        assert_eq!(diagnostics.fragments_requested, count);
        assert_eq!(diagnostics.fragments_dropped, extra);
        assert_eq!(diagnostics.overflowed, extra > 0);
    }
}
