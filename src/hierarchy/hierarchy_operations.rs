//! Hierarchy operations
//!
//! Level `l` has extent `(width >> l, height >> l)`. Extents that are not exact
//! halves give footprints of two or three fine texels per axis; neighbouring
//! footprints may overlap, which keeps the summary conservative.

use super::hierarchy_data::RangePyramid;
use crate::compaction::{RangeEntry, RangeLevel};
use crate::heap::HeapEpoch;
use rayon::prelude::*;
use std::ops::Range;

/// Levels to build: grow while under `max_levels` and both halved extents stay non-zero
pub fn hierarchy_level_count(width: u32, height: u32, max_levels: u32) -> u32 {
    if width == 0 || height == 0 || max_levels == 0 {
        return 0;
    }
    let mut levels = 1;
    while levels < max_levels
        && levels < u32::BITS
        && (width >> levels) > 0
        && (height >> levels) > 0
    {
        levels += 1;
    }
    levels
}

/// Extent of a level
#[inline]
pub fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    (width >> level, height >> level)
}

/// Fine texels (one axis) overlapping coarse texel `coarse` in normalized coordinates
#[inline]
pub fn footprint(coarse: u32, coarse_extent: u32, fine_extent: u32) -> Range<u32> {
    let fine = fine_extent as u64;
    let coarse_extent = coarse_extent as u64;
    let c = coarse as u64;
    let start = c * fine / coarse_extent;
    let end = ((c + 1) * fine).div_ceil(coarse_extent);
    start as u32..end.min(fine) as u32
}

/// Coarse texel (one axis) whose footprint contains fine texel `fine`
#[inline]
pub fn parent_cell(fine: u32, fine_extent: u32, coarse_extent: u32) -> u32 {
    (fine as u64 * coarse_extent as u64 / fine_extent as u64) as u32
}

/// Conservative union of two entries
#[inline]
pub fn merge_entries(a: RangeEntry, b: RangeEntry) -> RangeEntry {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b,
        (_, true) => a,
        _ => RangeEntry {
            offset: a.offset.min(b.offset),
            count: a.count.saturating_add(b.count),
            min_depth: a.min_depth.min(b.min_depth),
            max_depth: a.max_depth.max(b.max_depth),
        },
    }
}

/// Build one coarse level from the level directly beneath it
pub fn downsample_level(fine: &RangeLevel, width: u32, height: u32) -> RangeLevel {
    let entries = (0..width * height)
        .into_par_iter()
        .map(|cell| {
            let (cx, cy) = (cell % width, cell / width);
            let xs = footprint(cx, width, fine.width);
            footprint(cy, height, fine.height)
                .flat_map(|fy| xs.clone().map(move |fx| (fx, fy)))
                .map(|(fx, fy)| fine.entry(fx, fy))
                .fold(RangeEntry::EMPTY, merge_entries)
        })
        .collect();
    RangeLevel {
        width,
        height,
        entries,
    }
}

/// Build the pyramid on top of an exact level 0
pub fn build_hierarchy(level0: RangeLevel, max_levels: u32, epoch: HeapEpoch) -> RangePyramid {
    let (width, height) = (level0.width, level0.height);
    let level_count = hierarchy_level_count(width, height, max_levels).max(1);
    let dimension_limit = hierarchy_level_count(width, height, u32::MAX);

    let mut levels = Vec::with_capacity(level_count as usize);
    levels.push(level0);
    for level in 1..level_count {
        let (w, h) = level_extent(width, height, level);
        let coarse = downsample_level(&levels[level as usize - 1], w, h);
        levels.push(coarse);
    }

    let pyramid = RangePyramid {
        levels,
        dimension_limit,
        epoch,
    };
    if pyramid.truncated() {
        log::warn!(
            "[build_hierarchy] Stopped at {} of {} possible levels for {}x{}",
            pyramid.level_count(),
            dimension_limit,
            width,
            height
        );
    }
    pyramid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied(offset: u32, count: u32, depth: f32) -> RangeEntry {
        RangeEntry {
            offset,
            count,
            min_depth: depth,
            max_depth: depth,
        }
    }

    #[test]
    fn test_level_count_rule() {
        assert_eq!(hierarchy_level_count(100, 100, 8), 7);
        assert_eq!(hierarchy_level_count(100, 100, 4), 4);
        assert_eq!(hierarchy_level_count(1, 1, 8), 1);
        assert_eq!(hierarchy_level_count(640, 1, 8), 1);
        assert_eq!(hierarchy_level_count(8, 2, 8), 2);
    }

    #[test]
    fn test_footprints_cover_every_fine_texel() {
        for fine in 1..40u32 {
            let coarse = fine >> 1;
            if coarse == 0 {
                continue;
            }
            let mut covered = vec![false; fine as usize];
            for c in 0..coarse {
                let range = footprint(c, coarse, fine);
                assert!(range.len() >= 2 && range.len() <= 3, "fine {} coarse {}", fine, c);
                for f in range {
                    covered[f as usize] = true;
                }
            }
            assert!(covered.iter().all(|&c| c));
            for f in 0..fine {
                assert!(footprint(parent_cell(f, fine, coarse), coarse, fine).contains(&f));
            }
        }
    }

    #[test]
    fn test_merge_is_conservative() {
        let merged = merge_entries(occupied(7, 2, 3.0), occupied(4, 1, 1.5));
        assert_eq!(merged.offset, 4);
        assert_eq!(merged.count, 3);
        assert_eq!(merged.min_depth, 1.5);
        assert_eq!(merged.max_depth, 3.0);
        assert_eq!(merge_entries(RangeEntry::EMPTY, occupied(9, 1, 2.0)).offset, 9);
        assert!(merge_entries(RangeEntry::EMPTY, RangeEntry::EMPTY).is_empty());
    }

    #[test]
    fn test_single_fragment_marks_ancestor_chain() {
        let mut level0 = RangeLevel::empty(13, 9);
        level0.entries[(5 * 13 + 11) as usize] = occupied(1, 1, 2.0);
        let pyramid = build_hierarchy(level0, 8, HeapEpoch(0));
        assert_eq!(pyramid.level_count(), 4);

        let (mut x, mut y) = (11, 5);
        for level in 1..pyramid.level_count() as usize {
            let fine = &pyramid.levels[level - 1];
            let coarse = &pyramid.levels[level];
            x = parent_cell(x, fine.width, coarse.width);
            y = parent_cell(y, fine.height, coarse.height);
            let entry = coarse.entry(x, y);
            assert_eq!(entry.count, 1, "level {}", level);
            assert_eq!(entry.min_depth, 2.0);
        }
    }

    #[test]
    fn test_truncation_is_reported() {
        let pyramid = build_hierarchy(RangeLevel::empty(64, 64), 3, HeapEpoch(0));
        assert_eq!(pyramid.level_count(), 3);
        assert!(pyramid.truncated());
        assert_eq!(pyramid.levels[2].width, 16);
    }
}
