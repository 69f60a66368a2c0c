//! Reference renderer operations

use super::reference_data::{FrameOutput, LayerImage, ReferenceRenderer};
use crate::camera::CameraFrame;
use crate::compaction::{compact_layer0, create_depth_arrays, DepthArrays, RangeLevel};
use crate::config::RendererConfig;
use crate::diagnostics::{log_frame_diagnostics, DiagnosticsCounters, FrameDiagnostics};
use crate::error::HiabResult;
use crate::fragments::{
    build_heap_parallel, build_heap_sequential, create_fragment_heap, rasterize_scene,
    reset_fragment_heap, FragmentHeap,
};
use crate::heap::{compute_heap_info, HeapEpoch, HeapInfo};
use crate::hierarchy::{build_hierarchy, RangePyramid};
use crate::scene::Scene;
use crate::trace::{trace_image, TracePreview};
use parking_lot::RwLock;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn empty_pyramid(viewport: (u32, u32), max_levels: u32, epoch: HeapEpoch) -> RangePyramid {
    build_hierarchy(RangeLevel::empty(viewport.0, viewport.1), max_levels, epoch)
}

impl ReferenceRenderer {
    /// Validate the configuration and allocate storage for `viewport`
    pub fn new(config: RendererConfig, viewport: (u32, u32)) -> HiabResult<Self> {
        config.validate()?;
        let viewport = (viewport.0.max(1), viewport.1.max(1));
        let epoch = HeapEpoch(0);
        let info = compute_heap_info(viewport.0, viewport.1, config.avg_layers_per_pixel, epoch)?;

        log::info!(
            "[ReferenceRenderer::new] {}x{} viewport, heap capacity {} ({}x{} store)",
            viewport.0,
            viewport.1,
            info.capacity,
            1u32 << info.width_exp,
            1u32 << info.height_exp
        );

        Ok(Self {
            pyramid: empty_pyramid(viewport, config.max_hierarchy_levels, epoch),
            preview: TracePreview::new(
                config.default_trace_iterations,
                config.max_trace_iterations,
            ),
            heap: create_fragment_heap(info),
            arrays: create_depth_arrays(info),
            counters: DiagnosticsCounters::default(),
            rejected_fragments: 0,
            diagnostics: Arc::new(RwLock::new(FrameDiagnostics::default())),
            pending_viewport: None,
            frame_index: 0,
            sequential_build: false,
            config,
            viewport,
            epoch,
        })
    }

    /// Build fragments single-threaded so list order follows draw order
    pub fn with_sequential_build(mut self, sequential: bool) -> Self {
        self.sequential_build = sequential;
        self
    }

    /// Record a viewport change; storage is reallocated at the next frame start
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        let requested = (width.max(1), height.max(1));
        if requested == self.viewport {
            self.pending_viewport = None;
        } else {
            self.pending_viewport = Some(requested);
        }
    }

    /// Reallocate all viewport-sized storage if a change is pending
    pub fn apply_viewport_changes(&mut self) -> HiabResult<bool> {
        let Some(viewport) = self.pending_viewport.take() else {
            return Ok(false);
        };

        let epoch = HeapEpoch(self.epoch.0.wrapping_add(1));
        let info = compute_heap_info(
            viewport.0,
            viewport.1,
            self.config.avg_layers_per_pixel,
            epoch,
        )?;
        self.preview.disarm_for_resize();

        self.heap = create_fragment_heap(info);
        self.arrays = create_depth_arrays(info);
        self.pyramid = empty_pyramid(viewport, self.config.max_hierarchy_levels, epoch);
        self.counters = DiagnosticsCounters::default();
        self.rejected_fragments = 0;
        self.viewport = viewport;
        self.epoch = epoch;

        log::info!(
            "[ReferenceRenderer::apply_viewport_changes] {}x{}, capacity {}, epoch {}",
            viewport.0,
            viewport.1,
            info.capacity,
            epoch.0
        );
        Ok(true)
    }

    fn rebuild(&mut self, scene: &Scene, camera: &CameraFrame) -> HiabResult<()> {
        reset_fragment_heap(&mut self.heap);
        let samples = rasterize_scene(scene, camera, self.viewport);
        let build = if self.sequential_build {
            build_heap_sequential(&self.heap, &samples)
        } else {
            build_heap_parallel(&self.heap, &samples)
        };
        self.rejected_fragments = build.rejected;

        let (level0, report) = compact_layer0(&self.heap, &mut self.arrays)?;
        self.pyramid = build_hierarchy(level0, self.config.max_hierarchy_levels, self.epoch);
        self.counters = DiagnosticsCounters {
            node_alloc_pointer: self.heap.alloc_pointer.load(Ordering::Acquire),
            depth_alloc_pointer: self.arrays.alloc_pointer.load(Ordering::Acquire),
            truncated_pixels: report.truncated_pixels,
            _padding: 0,
        };
        Ok(())
    }

    /// Run one frame: apply pending changes, rebuild unless the preview is armed,
    /// then either trace against the bake or show the layer counts
    pub fn render_frame(&mut self, scene: &Scene, camera: &CameraFrame) -> HiabResult<FrameOutput> {
        self.apply_viewport_changes()?;

        let plan = self.preview.begin_frame(camera);
        if plan.rebuild {
            self.rebuild(scene, camera)?;
        }

        let diagnostics = FrameDiagnostics {
            fragments_rejected: self.rejected_fragments,
            ..FrameDiagnostics::from_counters(
                self.frame_index,
                &self.heap.info,
                &self.counters,
                self.pyramid.level_count(),
                self.pyramid.truncated(),
                plan.rebuild,
            )
        };
        log_frame_diagnostics(&diagnostics);
        *self.diagnostics.write() = diagnostics;
        self.frame_index += 1;

        match plan.trace {
            Some(snapshot) => {
                let params = self.preview.march_params(self.config.fragment_thickness);
                let image = trace_image(
                    camera,
                    self.viewport,
                    &snapshot,
                    &self.pyramid,
                    &self.arrays,
                    &params,
                )?;
                Ok(FrameOutput::Trace(image))
            }
            None => Ok(FrameOutput::Layers(self.layer_image())),
        }
    }

    /// Per-pixel fragment counts of the current level 0
    pub fn layer_image(&self) -> LayerImage {
        let level0 = &self.pyramid.levels[0];
        LayerImage {
            width: level0.width,
            height: level0.height,
            counts: level0.entries.iter().map(|e| e.count).collect(),
        }
    }

    pub fn set_trace_armed(&mut self, armed: bool) {
        self.preview.request_armed(armed);
    }

    pub fn toggle_trace(&mut self) -> bool {
        self.preview.toggle()
    }

    pub fn set_iteration_budget(&mut self, budget: u32) -> u32 {
        self.preview.set_iteration_budget(budget)
    }

    /// Telemetry of the last rendered frame
    pub fn diagnostics(&self) -> FrameDiagnostics {
        *self.diagnostics.read()
    }

    /// Shared handle for readers on other threads
    pub fn diagnostics_handle(&self) -> Arc<parking_lot::RwLock<FrameDiagnostics>> {
        Arc::clone(&self.diagnostics)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn heap_info(&self) -> &HeapInfo {
        &self.heap.info
    }

    pub fn fragment_heap(&self) -> &FragmentHeap {
        &self.heap
    }

    pub fn depth_arrays(&self) -> &DepthArrays {
        &self.arrays
    }

    pub fn pyramid(&self) -> &RangePyramid {
        &self.pyramid
    }

    pub fn preview(&self) -> &TracePreview {
        &self.preview
    }
}
