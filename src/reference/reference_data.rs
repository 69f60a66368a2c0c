//! Reference renderer state

use crate::compaction::DepthArrays;
use crate::config::RendererConfig;
use crate::diagnostics::{DiagnosticsCounters, FrameDiagnostics};
use crate::fragments::FragmentHeap;
use crate::heap::HeapEpoch;
use crate::hierarchy::RangePyramid;
use crate::trace::{TraceImage, TracePreview};
use parking_lot::RwLock;
use std::sync::Arc;

/// Per-pixel fragment counts from range level 0 (shown while the preview is inactive)
#[derive(Debug, Clone, PartialEq)]
pub struct LayerImage {
    pub width: u32,
    pub height: u32,
    pub counts: Vec<u32>,
}

impl LayerImage {
    pub fn count(&self, x: u32, y: u32) -> u32 {
        self.counts[(y * self.width + x) as usize]
    }
}

/// What a frame put on screen
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutput {
    Layers(LayerImage),
    Trace(TraceImage),
}

pub struct ReferenceRenderer {
    pub(crate) config: RendererConfig,
    pub(crate) viewport: (u32, u32),
    /// Requested by `set_viewport`, applied at the next frame start
    pub(crate) pending_viewport: Option<(u32, u32)>,
    pub(crate) epoch: HeapEpoch,
    pub(crate) heap: FragmentHeap,
    pub(crate) arrays: DepthArrays,
    pub(crate) pyramid: RangePyramid,
    /// Allocator state of the last build
    pub(crate) counters: DiagnosticsCounters,
    /// Samples of the last build that missed the viewport
    pub(crate) rejected_fragments: u32,
    pub(crate) preview: TracePreview,
    pub(crate) diagnostics: Arc<RwLock<FrameDiagnostics>>,
    pub(crate) frame_index: u64,
    /// Append fragments from one thread in draw order
    pub(crate) sequential_build: bool,
}
