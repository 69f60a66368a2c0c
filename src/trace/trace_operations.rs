//! Trace preview state transitions
//!
//! The external toggle only records a request; transitions happen in
//! `begin_frame`, which is the single writer of the snapshot.

use super::trace_data::{
    BakedSnapshot, FramePlan, MarchParams, RayTransform, TraceError, TraceMode, TracePreview,
    TraceUniform,
};
use crate::camera::CameraFrame;

impl BakedSnapshot {
    /// Freeze the matrices and clip planes of `camera`
    pub fn capture(camera: &CameraFrame) -> Self {
        Self {
            bake_view: camera.view,
            bake_projection: camera.projection,
            bake_nearz: camera.near_plane,
            bake_farz: camera.far_plane,
        }
    }
}

impl TracePreview {
    pub fn new(default_budget: u32, max_iterations: u32) -> Self {
        Self {
            mode: TraceMode::Inactive,
            requested_armed: false,
            iteration_budget: default_budget.min(max_iterations),
            max_iterations,
        }
    }

    /// Record the external toggle state
    pub fn request_armed(&mut self, armed: bool) {
        self.requested_armed = armed;
    }

    /// Flip the external toggle; returns the new request
    pub fn toggle(&mut self) -> bool {
        self.requested_armed = !self.requested_armed;
        self.requested_armed
    }

    /// Set the iteration budget, clamped to `[0, max_iterations]`; returns the value applied
    pub fn set_iteration_budget(&mut self, budget: u32) -> u32 {
        self.iteration_budget = budget.min(self.max_iterations);
        self.iteration_budget
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.mode, TraceMode::Armed(_))
    }

    pub fn snapshot(&self) -> Result<&BakedSnapshot, TraceError> {
        match &self.mode {
            TraceMode::Armed(snapshot) => Ok(snapshot),
            TraceMode::Inactive => Err(TraceError::NotArmed),
        }
    }

    pub fn march_params(&self, fragment_thickness: f32) -> MarchParams {
        MarchParams {
            iteration_budget: self.iteration_budget,
            fragment_thickness,
        }
    }

    /// Apply the pending toggle and decide the work of this frame
    pub fn begin_frame(&mut self, camera: &CameraFrame) -> FramePlan {
        match (self.mode, self.requested_armed) {
            (TraceMode::Inactive, false) => FramePlan {
                rebuild: true,
                trace: None,
                just_armed: false,
            },
            (TraceMode::Inactive, true) => {
                let snapshot = BakedSnapshot::capture(camera);
                self.mode = TraceMode::Armed(snapshot);
                log::info!(
                    "[TracePreview] Armed (near {:.3}, far {:.3}, budget {})",
                    snapshot.bake_nearz,
                    snapshot.bake_farz,
                    self.iteration_budget
                );
                FramePlan {
                    rebuild: true,
                    trace: Some(snapshot),
                    just_armed: true,
                }
            }
            (TraceMode::Armed(snapshot), true) => FramePlan {
                rebuild: false,
                trace: Some(snapshot),
                just_armed: false,
            },
            (TraceMode::Armed(_), false) => {
                self.mode = TraceMode::Inactive;
                log::info!("[TracePreview] Disarmed, snapshot dropped");
                FramePlan {
                    rebuild: true,
                    trace: None,
                    just_armed: false,
                }
            }
        }
    }

    /// Drop the snapshot because the storage it refers to is being reallocated
    pub fn disarm_for_resize(&mut self) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.mode = TraceMode::Inactive;
        self.requested_armed = false;
        log::info!("[TracePreview] Disarmed by viewport change");
        true
    }
}

/// Pack everything trace_preview.wgsl needs for one frame
pub fn trace_uniform(
    transform: &RayTransform,
    snapshot: &BakedSnapshot,
    params: &MarchParams,
    live_viewport: (u32, u32),
    level_count: u32,
) -> TraceUniform {
    TraceUniform {
        ray_to_bake: transform.ray_to_bake.into(),
        bake_projection: snapshot.bake_projection.into(),
        live_projection: transform.live_projection,
        bake_nearz: snapshot.bake_nearz,
        bake_farz: snapshot.bake_farz,
        fragment_thickness: params.fragment_thickness,
        iteration_budget: params.iteration_budget,
        live_viewport: [live_viewport.0, live_viewport.1],
        level_count,
        _padding: 0,
    }
}
