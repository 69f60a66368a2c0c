//! Renderer configuration
//!
//! Static tuning inputs. They are read once when a renderer is created and are
//! never renegotiated at runtime.

use crate::constants::{heap, hierarchy, trace};
use crate::error::{HiabError, HiabResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration shared by the reference and GPU renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Heap sizing hint: expected fragments per pixel
    pub avg_layers_per_pixel: u32,
    /// Maximum number of hierarchy levels, level 0 included
    pub max_hierarchy_levels: u32,
    /// Upper bound of the trace iteration-budget control
    pub max_trace_iterations: u32,
    /// Iteration budget in effect before the control is touched
    pub default_trace_iterations: u32,
    /// Depth slab (eye units) a stored fragment occupies during ray marching
    pub fragment_thickness: f32,
    /// Background color of the screen output
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            avg_layers_per_pixel: heap::DEFAULT_AVG_LAYERS_PER_PIXEL,
            max_hierarchy_levels: hierarchy::DEFAULT_MAX_LEVELS,
            max_trace_iterations: trace::MAX_ITERATIONS,
            default_trace_iterations: trace::DEFAULT_ITERATIONS,
            fragment_thickness: trace::DEFAULT_FRAGMENT_THICKNESS,
            clear_color: [0.05, 0.1, 0.1, 1.0],
        }
    }
}

impl RendererConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> HiabResult<()> {
        if self.avg_layers_per_pixel == 0 {
            return Err(invalid(
                "avg_layers_per_pixel",
                self.avg_layers_per_pixel,
                "must be at least 1",
            ));
        }

        if self.avg_layers_per_pixel > 64 {
            return Err(invalid(
                "avg_layers_per_pixel",
                self.avg_layers_per_pixel,
                "exceeds maximum of 64",
            ));
        }

        if self.max_hierarchy_levels == 0 || self.max_hierarchy_levels > hierarchy::MAX_LEVELS_LIMIT
        {
            return Err(invalid(
                "max_hierarchy_levels",
                self.max_hierarchy_levels,
                "must be within 1..=16",
            ));
        }

        if self.default_trace_iterations > self.max_trace_iterations {
            return Err(invalid(
                "default_trace_iterations",
                self.default_trace_iterations,
                "exceeds max_trace_iterations",
            ));
        }

        if !(self.fragment_thickness.is_finite() && self.fragment_thickness >= 0.0) {
            return Err(invalid(
                "fragment_thickness",
                self.fragment_thickness,
                "must be a finite, non-negative distance",
            ));
        }

        log::debug!("[RendererConfig] Configuration validated: {:?}", self);
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> HiabResult<Self> {
        let config: RendererConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

/// Load and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> HiabResult<RendererConfig> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| HiabError::IoError {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    log::info!("[load_config] Loaded renderer config from {}", path.display());
    RendererConfig::from_toml_str(&source)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> HiabError {
    HiabError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
