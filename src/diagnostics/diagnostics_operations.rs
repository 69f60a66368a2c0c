//! Diagnostics operations

use super::diagnostics_data::{DiagnosticsCounters, FrameDiagnostics};
use crate::constants::heap::FIRST_NODE;
use crate::heap::HeapInfo;

impl FrameDiagnostics {
    /// Derive frame telemetry from the allocator counters of the frame's build
    pub fn from_counters(
        frame_index: u64,
        info: &HeapInfo,
        counters: &DiagnosticsCounters,
        hierarchy_levels: u32,
        hierarchy_truncated: bool,
        rebuilt: bool,
    ) -> Self {
        let requested = counters.node_alloc_pointer.saturating_sub(FIRST_NODE);
        let stored = requested.min(info.usable_slots());
        let dropped = requested - stored;
        let pixels = info.pixel_count().max(1);

        Self {
            frame_index,
            viewport: info.viewport,
            capacity: info.capacity,
            fragments_requested: requested,
            fragments_stored: stored,
            fragments_dropped: dropped,
            fragments_rejected: 0,
            avg_fragments_per_pixel: stored as f32 / pixels as f32,
            depth_slots_reserved: counters.depth_alloc_pointer.saturating_sub(FIRST_NODE),
            truncated_pixels: counters.truncated_pixels,
            hierarchy_levels,
            hierarchy_truncated,
            overflowed: dropped > 0 || counters.truncated_pixels > 0,
            rebuilt,
        }
    }
}

/// Level of the per-frame summary line: `warn` once anything was lost or capped
pub fn summary_level(diagnostics: &FrameDiagnostics) -> log::Level {
    if diagnostics.overflowed
        || diagnostics.hierarchy_truncated
        || diagnostics.fragments_rejected > 0
    {
        log::Level::Warn
    } else {
        log::Level::Debug
    }
}

/// Per-frame counters go to `debug`; overflow, rejected samples and a capped
/// hierarchy raise the summary to `warn`
pub fn log_frame_diagnostics(diagnostics: &FrameDiagnostics) {
    if diagnostics.overflowed {
        log::warn!(
            "[Frame {}] Heap overflow: {} of {} fragments dropped (capacity {}), {} truncated spans",
            diagnostics.frame_index,
            diagnostics.fragments_dropped,
            diagnostics.fragments_requested,
            diagnostics.capacity,
            diagnostics.truncated_pixels
        );
    }
    log::log!(
        summary_level(diagnostics),
        "[Frame {}] {}x{}: {} fragments, {} rejected, {:.2}/pixel, {} levels{}{}",
        diagnostics.frame_index,
        diagnostics.viewport.0,
        diagnostics.viewport.1,
        diagnostics.fragments_stored,
        diagnostics.fragments_rejected,
        diagnostics.avg_fragments_per_pixel,
        diagnostics.hierarchy_levels,
        if diagnostics.hierarchy_truncated {
            " (capped)"
        } else {
            ""
        },
        if diagnostics.rebuilt { "" } else { " [baked]" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{compute_heap_info, HeapEpoch};

    #[test]
    fn test_counters_without_overflow() {
        let info = compute_heap_info(10, 10, 2, HeapEpoch(0)).expect("heap info");
        let counters = DiagnosticsCounters {
            node_alloc_pointer: 151,
            depth_alloc_pointer: 151,
            ..Default::default()
        };
        let d = FrameDiagnostics::from_counters(3, &info, &counters, 4, false, true);
        assert_eq!(d.fragments_requested, 150);
        assert_eq!(d.fragments_stored, 150);
        assert_eq!(d.fragments_dropped, 0);
        assert!((d.avg_fragments_per_pixel - 1.5).abs() < 1e-6);
        assert!(!d.overflowed);
    }

    #[test]
    fn test_counters_past_capacity() {
        let info = compute_heap_info(4, 4, 1, HeapEpoch(0)).expect("heap info");
        let counters = DiagnosticsCounters {
            node_alloc_pointer: info.capacity + 1,
            depth_alloc_pointer: info.capacity,
            ..Default::default()
        };
        let d = FrameDiagnostics::from_counters(0, &info, &counters, 1, false, true);
        assert_eq!(d.fragments_stored, info.capacity - 1);
        assert_eq!(d.fragments_dropped, 1);
        assert!(d.overflowed);
        assert_eq!(summary_level(&d), log::Level::Warn);
    }

    #[test]
    fn test_capped_hierarchy_is_a_warning() {
        let info = compute_heap_info(64, 64, 2, HeapEpoch(0)).expect("heap info");
        let counters = DiagnosticsCounters {
            node_alloc_pointer: 11,
            depth_alloc_pointer: 11,
            ..Default::default()
        };
        let quiet = FrameDiagnostics::from_counters(1, &info, &counters, 7, false, true);
        assert_eq!(summary_level(&quiet), log::Level::Debug);

        let capped = FrameDiagnostics::from_counters(1, &info, &counters, 3, true, true);
        assert!(!capped.overflowed);
        assert_eq!(summary_level(&capped), log::Level::Warn);

        let rejected = FrameDiagnostics {
            fragments_rejected: 2,
            ..quiet
        };
        assert_eq!(summary_level(&rejected), log::Level::Warn);
    }
}
