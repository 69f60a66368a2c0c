//! Trace preview data structures

use bytemuck::{Pod, Zeroable};
use cgmath::Matrix4;
use static_assertions::const_assert_eq;

/// Camera state frozen when the preview is armed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakedSnapshot {
    pub bake_view: Matrix4<f32>,
    pub bake_projection: Matrix4<f32>,
    pub bake_nearz: f32,
    pub bake_farz: f32,
}

/// Inactive -> Armed -> Inactive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceMode {
    Inactive,
    Armed(BakedSnapshot),
}

/// Mode toggle plus the iteration-budget control
#[derive(Debug, Clone)]
pub struct TracePreview {
    pub mode: TraceMode,
    /// Last value of the external toggle; applied at the next frame start
    pub requested_armed: bool,
    pub iteration_budget: u32,
    pub max_iterations: u32,
}

/// What a frame has to do, decided once at frame start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    /// Run build, compaction and downsample this frame
    pub rebuild: bool,
    /// March against this snapshot after the (optional) rebuild
    pub trace: Option<BakedSnapshot>,
    /// The preview was armed by this frame; the rebuild produces the bake
    pub just_armed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Trace preview is not armed")]
    NotArmed,

    #[error("No baked hierarchy is available")]
    MissingBake,

    #[error("Live camera view matrix is not invertible")]
    DegenerateCamera,
}

/// Live view space to baked view space, plus the live projection terms needed to
/// rebuild a view ray from NDC
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayTransform {
    pub ray_to_bake: Matrix4<f32>,
    /// `[P00, P11, P20, P21]` of the live projection
    pub live_projection: [f32; 4],
}

/// A live ray clipped to the baked depth slab and viewport, in baked screen space.
/// Screen position is linear in `s`; so is inverse depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakedRay {
    /// Normalized baked screen position at s = 0 (y down)
    pub u0: [f32; 2],
    pub du: [f32; 2],
    pub inv_z0: f32,
    pub inv_z1: f32,
    pub s_start: f32,
    pub s_end: f32,
}

impl BakedRay {
    #[inline]
    pub fn point(&self, s: f32) -> [f32; 2] {
        [self.u0[0] + s * self.du[0], self.u0[1] + s * self.du[1]]
    }

    #[inline]
    pub fn inv_depth(&self, s: f32) -> f32 {
        self.inv_z0 + s * (self.inv_z1 - self.inv_z0)
    }

    #[inline]
    pub fn depth(&self, s: f32) -> f32 {
        1.0 / self.inv_depth(s)
    }
}

/// Knobs forwarded to the march
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchParams {
    pub iteration_budget: u32,
    pub fragment_thickness: f32,
}

/// Nearest baked fragment hit by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    /// Baked level-0 pixel holding the fragment
    pub pixel: (u32, u32),
    /// Stored fragment depth
    pub depth: f32,
    pub payload: u32,
    /// Ray parameter of the hit
    pub s: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraceSample {
    pub hit: Option<TraceHit>,
    pub iterations: u32,
    /// The budget ran out before the ray left the baked viewport
    pub exhausted: bool,
}

/// One sample per live pixel, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct TraceImage {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<TraceSample>,
}

impl TraceImage {
    pub fn sample(&self, x: u32, y: u32) -> &TraceSample {
        &self.samples[(y * self.width + x) as usize]
    }

    pub fn hit_count(&self) -> usize {
        self.samples.iter().filter(|s| s.hit.is_some()).count()
    }
}

/// Trace parameters as seen by trace_preview.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TraceUniform {
    pub ray_to_bake: [[f32; 4]; 4],
    pub bake_projection: [[f32; 4]; 4],
    pub live_projection: [f32; 4],
    pub bake_nearz: f32,
    pub bake_farz: f32,
    pub fragment_thickness: f32,
    pub iteration_budget: u32,
    pub live_viewport: [u32; 2],
    pub level_count: u32,
    pub _padding: u32,
}

const_assert_eq!(std::mem::size_of::<TraceUniform>(), 176);
