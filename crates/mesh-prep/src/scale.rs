//! Uniform scaling to a target print size.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Mesh;
use crate::config::PipelineConfig;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::{OperationTimer, log_mesh_stats};

/// Bounding-box axis whose extent is matched to the target size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAxis {
    #[default]
    LongestDimension,
    ShortestDimension,
    X,
    Y,
    Z,
}

impl ScaleAxis {
    pub fn name(&self) -> &'static str {
        match self {
            ScaleAxis::LongestDimension => "longest_dimension",
            ScaleAxis::ShortestDimension => "shortest_dimension",
            ScaleAxis::X => "x",
            ScaleAxis::Y => "y",
            ScaleAxis::Z => "z",
        }
    }

    fn extent(&self, dims: &nalgebra::Vector3<f64>) -> f64 {
        match self {
            ScaleAxis::LongestDimension => dims.max(),
            ScaleAxis::ShortestDimension => dims.min(),
            ScaleAxis::X => dims.x,
            ScaleAxis::Y => dims.y,
            ScaleAxis::Z => dims.z,
        }
    }
}

impl std::fmt::Display for ScaleAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ScaleAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "longest" | "longest_dimension" => Ok(ScaleAxis::LongestDimension),
            "shortest" | "shortest_dimension" => Ok(ScaleAxis::ShortestDimension),
            "x" => Ok(ScaleAxis::X),
            "y" => Ok(ScaleAxis::Y),
            "z" => Ok(ScaleAxis::Z),
            other => Err(format!("unknown scale axis '{}'", other)),
        }
    }
}

/// Scales a mesh so one bounding-box extent equals the target size.
#[derive(Debug, Clone)]
pub struct ScaleNormalizer {
    target_size_mm: f64,
    axis: ScaleAxis,
    center_at_origin: bool,
}

impl ScaleNormalizer {
    pub fn new(target_size_mm: f64, axis: ScaleAxis) -> Self {
        Self {
            target_size_mm,
            axis,
            center_at_origin: true,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            target_size_mm: config.target_size_mm,
            axis: config.scale_axis,
            center_at_origin: config.center_at_origin,
        }
    }

    pub fn with_centering(mut self, center_at_origin: bool) -> Self {
        self.center_at_origin = center_at_origin;
        self
    }

    /// The factor that would be applied to `mesh`.
    ///
    /// # Errors
    ///
    /// [`MeshError::EmptyMesh`] without vertices, [`MeshError::Scale`] when
    /// the selected extent is zero or not finite or any coordinate is NaN
    /// or infinite.
    pub fn scale_factor(&self, mesh: &Mesh) -> MeshResult<f64> {
        let dims = mesh
            .extents()
            .ok_or_else(|| MeshError::empty_mesh("cannot scale a mesh without vertices"))?;
        if mesh.non_finite_vertex_count() > 0 {
            return Err(MeshError::scale(self.axis.name(), f64::NAN));
        }
        let extent = self.axis.extent(&dims);
        if !extent.is_finite() || extent <= 0.0 {
            return Err(MeshError::scale(self.axis.name(), extent));
        }
        let factor = self.target_size_mm / extent;
        if !factor.is_finite() {
            return Err(MeshError::scale(self.axis.name(), extent));
        }
        Ok(factor)
    }

    /// Scale uniformly, then optionally center the bounding box on the
    /// origin. The input is consumed; on error it is dropped unchanged.
    pub fn normalize(&self, mut mesh: Mesh) -> MeshResult<Mesh> {
        let _timer = OperationTimer::with_context("scale", &mesh);
        let factor = self.scale_factor(&mesh)?;

        mesh.scale(factor);
        if self.center_at_origin
            && let Some(center) = mesh.bounds_center()
        {
            mesh.translate(-center.coords);
        }

        info!(
            axis = self.axis.name(),
            factor = format!("{:.6}", factor),
            target_mm = self.target_size_mm,
            "Scaled mesh"
        );
        debug!(centered = self.center_at_origin, "Scale applied");
        log_mesh_stats(&mesh, "after scale");
        Ok(mesh)
    }
}

/// Scale `mesh` with the settings from `config`.
pub fn normalize(mesh: Mesh, config: &PipelineConfig) -> MeshResult<Mesh> {
    ScaleNormalizer::from_config(config).normalize(mesh)
}
