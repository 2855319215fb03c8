//! Pipeline configuration.
//!
//! `PipelineConfig` is a plain value. Every threshold the pipeline uses lives
//! here so that runs are reproducible from a TOML or JSON file.
//!
//! # Example TOML
//!
//! ```toml
//! target_size_mm = 80.0
//! scale_axis = "z"
//! center_at_origin = true
//! small_component_fraction = 0.02
//! ```

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::scale::ScaleAxis;

/// Accepted range for [`PipelineConfig::target_size_mm`].
pub const TARGET_SIZE_RANGE: RangeInclusive<f64> = 1.0..=1000.0;

/// Settings for one pipeline run. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size of the scaled axis in millimeters. Default: `100.0`.
    pub target_size_mm: f64,
    /// Move the bounding-box center to the origin after scaling.
    pub center_at_origin: bool,
    pub auto_repair: bool,
    pub auto_scale: bool,
    /// Fraction of the total vertex count below which a component is dropped.
    pub small_component_fraction: f64,
    pub scale_axis: ScaleAxis,
    /// Largest convex hole closed by ear clipping. Default: `8`.
    pub max_ear_clip_vertices: usize,
    pub check_self_intersections: bool,
    /// Volumes under this raise `SMALL_VOLUME`. Default: `1.0` mm³.
    pub min_volume_mm3: f64,
    /// Face counts over this raise `HIGH_POLYGON_COUNT`.
    pub max_face_count: usize,
    /// Faces with a smaller area count as degenerate.
    pub degenerate_area_epsilon: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_size_mm: 100.0,
            center_at_origin: true,
            auto_repair: true,
            auto_scale: true,
            small_component_fraction: 0.05,
            scale_axis: ScaleAxis::LongestDimension,
            max_ear_clip_vertices: 8,
            check_self_intersections: true,
            min_volume_mm3: 1.0,
            max_face_count: 500_000,
            degenerate_area_epsilon: 1e-10,
        }
    }
}

impl PipelineConfig {
    /// Default settings with a different target size.
    pub fn with_target_size(target_size_mm: f64) -> Self {
        Self {
            target_size_mm,
            ..Default::default()
        }
    }

    /// Reject out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] naming the first offending field.
    pub fn check(&self) -> MeshResult<()> {
        if !TARGET_SIZE_RANGE.contains(&self.target_size_mm) {
            return Err(MeshError::invalid_config(
                "target_size_mm",
                format!(
                    "{} is outside {}..={} mm",
                    self.target_size_mm,
                    TARGET_SIZE_RANGE.start(),
                    TARGET_SIZE_RANGE.end()
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.small_component_fraction) {
            return Err(MeshError::invalid_config(
                "small_component_fraction",
                format!("{} is outside 0..=1", self.small_component_fraction),
            ));
        }
        if self.max_ear_clip_vertices < 3 {
            return Err(MeshError::invalid_config(
                "max_ear_clip_vertices",
                format!("{} is below 3", self.max_ear_clip_vertices),
            ));
        }
        if !self.min_volume_mm3.is_finite() || self.min_volume_mm3 < 0.0 {
            return Err(MeshError::invalid_config(
                "min_volume_mm3",
                format!("{} must be a finite, non-negative volume", self.min_volume_mm3),
            ));
        }
        if !self.degenerate_area_epsilon.is_finite() || self.degenerate_area_epsilon < 0.0 {
            return Err(MeshError::invalid_config(
                "degenerate_area_epsilon",
                format!("{} must be finite and non-negative", self.degenerate_area_epsilon),
            ));
        }
        Ok(())
    }

    /// Parse and check a TOML document.
    #[cfg(feature = "pipeline-config")]
    pub fn from_toml(toml_str: &str) -> MeshResult<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| MeshError::config_parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load and check a TOML file.
    #[cfg(feature = "pipeline-config")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| MeshError::io_read(path, e))?;
        Self::from_toml(&contents)
    }

    #[cfg(feature = "pipeline-config")]
    pub fn to_toml(&self) -> MeshResult<String> {
        toml::to_string_pretty(self).map_err(|e| MeshError::config_parse(e.to_string()))
    }

    /// Parse and check a JSON document.
    #[cfg(feature = "pipeline-config")]
    pub fn from_json(json_str: &str) -> MeshResult<Self> {
        let config: Self =
            serde_json::from_str(json_str).map_err(|e| MeshError::config_parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    #[cfg(feature = "pipeline-config")]
    pub fn to_json(&self) -> MeshResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MeshError::config_parse(e.to_string()))
    }
}
