//! Printability validation and the validated-mesh proof type.
//!
//! [`PrintabilityValidator::validate`] collects every finding into a
//! [`ValidationResult`]. Errors make a mesh unprintable; warnings are
//! advisory. [`PrintabilityValidator::certify`] is the only way to obtain a
//! [`ValidatedMesh`], and STL export accepts nothing else.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::Mesh;
use crate::adjacency::MeshAdjacency;
use crate::config::PipelineConfig;
use crate::error::MeshResult;
use crate::intersect::has_self_intersections;
use crate::io::{StlFormat, save_stl};
use crate::tracing_ext::log_validation_result;

/// Findings that make a mesh unprintable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// The mesh has no faces.
    #[serde(rename = "EMPTY_MESH")]
    EmptyMesh,
    /// A face references a vertex that does not exist.
    #[serde(rename = "INVALID_INDICES")]
    InvalidIndices,
    /// A vertex coordinate is NaN or infinite.
    #[serde(rename = "NON_FINITE_VERTICES")]
    NonFiniteVertices,
    /// Some edge is not shared by exactly two oppositely wound faces.
    #[serde(rename = "NOT_WATERTIGHT")]
    NotWatertight,
    /// Enclosed volume is zero or negative.
    #[serde(rename = "INVALID_VOLUME")]
    InvalidGeometry,
    /// Scaling to the target size was impossible.
    #[serde(rename = "SCALE_FAILED")]
    ScaleFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EmptyMesh => "EMPTY_MESH",
            ErrorCode::InvalidIndices => "INVALID_INDICES",
            ErrorCode::NonFiniteVertices => "NON_FINITE_VERTICES",
            ErrorCode::NotWatertight => "NOT_WATERTIGHT",
            ErrorCode::InvalidGeometry => "INVALID_VOLUME",
            ErrorCode::ScaleFailed => "SCALE_FAILED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::EmptyMesh => "Mesh has no faces",
            ErrorCode::InvalidIndices => "Faces reference vertices that do not exist",
            ErrorCode::NonFiniteVertices => "Some vertex coordinates are NaN or infinite",
            ErrorCode::NotWatertight => "Mesh has holes or inconsistent winding",
            ErrorCode::InvalidGeometry => "Mesh encloses no positive volume",
            ErrorCode::ScaleFailed => "Mesh could not be scaled to the target size",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory findings that do not block export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    MultipleComponents,
    SelfIntersection,
    SmallVolume,
    HighPolygonCount,
    DegenerateFaces,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::MultipleComponents => "MULTIPLE_COMPONENTS",
            WarningCode::SelfIntersection => "SELF_INTERSECTION",
            WarningCode::SmallVolume => "SMALL_VOLUME",
            WarningCode::HighPolygonCount => "HIGH_POLYGON_COUNT",
            WarningCode::DegenerateFaces => "DEGENERATE_FACES",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WarningCode::MultipleComponents => "Mesh has more than one disconnected body",
            WarningCode::SelfIntersection => "Non-adjacent triangles overlap",
            WarningCode::SmallVolume => "Volume is below the minimum printable volume",
            WarningCode::HighPolygonCount => "Face count may slow down slicing",
            WarningCode::DegenerateFaces => "Some faces have near-zero area",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geometry statistics gathered during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshStats {
    /// Signed volume in mm³ (negative when inside-out).
    pub volume: f64,
    /// Surface area in mm².
    pub area: f64,
    pub vertex_count: usize,
    pub face_count: usize,
    pub component_count: usize,
    pub is_watertight: bool,
    pub boundary_edge_count: usize,
    pub non_manifold_edge_count: usize,
    pub degenerate_face_count: usize,
    /// Bounding box size (x, y, z) in mm.
    pub dimensions: Option<[f64; 3]>,
}

/// Outcome of validating one mesh. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<ErrorCode>,
    warnings: Vec<WarningCode>,
    stats: MeshStats,
}

impl ValidationResult {
    pub(crate) fn new(errors: Vec<ErrorCode>, warnings: Vec<WarningCode>, stats: MeshStats) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            stats,
        }
    }

    pub(crate) fn push_error(&mut self, code: ErrorCode) {
        if !self.errors.contains(&code) {
            self.errors.push(code);
        }
        self.is_valid = false;
    }

    /// True iff there are no errors.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[ErrorCode] {
        &self.errors
    }

    pub fn warnings(&self) -> &[WarningCode] {
        &self.warnings
    }

    pub fn stats(&self) -> &MeshStats {
        &self.stats
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.contains(&code)
    }

    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.contains(&code)
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = &self.stats;
        writeln!(f, "Validation Result:")?;
        writeln!(f, "  Valid: {}", if self.is_valid { "yes" } else { "NO" })?;
        writeln!(f, "  Vertices: {}", s.vertex_count)?;
        writeln!(f, "  Faces: {}", s.face_count)?;
        writeln!(f, "  Components: {}", s.component_count)?;
        if let Some([dx, dy, dz]) = s.dimensions {
            writeln!(f, "  Dimensions: {:.2} x {:.2} x {:.2} mm", dx, dy, dz)?;
        }
        writeln!(f, "  Volume: {:.3} mm³", s.volume)?;
        writeln!(f, "  Surface Area: {:.3} mm²", s.area)?;
        writeln!(
            f,
            "  Watertight: {} (boundary edges: {}, non-manifold edges: {})",
            if s.is_watertight { "yes" } else { "NO" },
            s.boundary_edge_count,
            s.non_manifold_edge_count
        )?;
        for error in &self.errors {
            writeln!(f, "  Error {}: {}", error, error.description())?;
        }
        for warning in &self.warnings {
            writeln!(f, "  Warning {}: {}", warning, warning.description())?;
        }
        Ok(())
    }
}

/// A mesh that passed validation. Obtained from
/// [`PrintabilityValidator::certify`] or a successful pipeline run; the mesh
/// inside can no longer be mutated.
#[derive(Debug, Clone)]
pub struct ValidatedMesh {
    mesh: Mesh,
    validation: ValidationResult,
}

impl ValidatedMesh {
    /// Wrap `mesh` only if `validation` carries no errors.
    pub(crate) fn from_validation(
        mesh: Mesh,
        validation: ValidationResult,
    ) -> Result<Self, RejectedMesh> {
        if validation.is_valid() {
            Ok(Self { mesh, validation })
        } else {
            Err(RejectedMesh { mesh, validation })
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    /// Give up the proof and take the mesh back.
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    /// Write this mesh as STL.
    pub fn save_stl(&self, path: &Path, format: StlFormat) -> MeshResult<()> {
        save_stl(self, path, format)
    }
}

/// A mesh that failed validation, returned with its findings.
#[derive(Debug, Clone)]
pub struct RejectedMesh {
    pub mesh: Mesh,
    pub validation: ValidationResult,
}

/// Checks the structural properties a slicer needs.
#[derive(Debug, Clone)]
pub struct PrintabilityValidator {
    check_self_intersections: bool,
    min_volume_mm3: f64,
    max_face_count: usize,
    degenerate_area_epsilon: f64,
}

impl Default for PrintabilityValidator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl PrintabilityValidator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            check_self_intersections: config.check_self_intersections,
            min_volume_mm3: config.min_volume_mm3,
            max_face_count: config.max_face_count,
            degenerate_area_epsilon: config.degenerate_area_epsilon,
        }
    }

    /// Enable or disable the pairwise self-intersection scan.
    pub fn with_self_intersection_check(mut self, enabled: bool) -> Self {
        self.check_self_intersections = enabled;
        self
    }

    /// Validate `mesh`, accumulating every error and warning.
    pub fn validate(&self, mesh: &Mesh) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut stats = MeshStats {
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
            dimensions: mesh.extents().map(|d| [d.x, d.y, d.z]),
            ..Default::default()
        };

        if mesh.faces.is_empty() {
            errors.push(ErrorCode::EmptyMesh);
            let result = ValidationResult::new(errors, warnings, stats);
            log_validation_result(&result);
            return result;
        }

        if let Err(e) = mesh.check_indices() {
            warn!("Cannot validate geometry: {}", e);
            errors.push(ErrorCode::InvalidIndices);
            let result = ValidationResult::new(errors, warnings, stats);
            log_validation_result(&result);
            return result;
        }

        let non_finite = mesh.non_finite_vertex_count();
        if non_finite > 0 {
            warn!(count = non_finite, "Mesh has non-finite vertex coordinates");
            errors.push(ErrorCode::NonFiniteVertices);
            stats.dimensions = None;
            let result = ValidationResult::new(errors, warnings, stats);
            log_validation_result(&result);
            return result;
        }

        let adjacency = MeshAdjacency::build(&mesh.faces);
        stats.is_watertight = adjacency.is_watertight();
        stats.boundary_edge_count = adjacency.boundary_edge_count();
        stats.non_manifold_edge_count = adjacency.non_manifold_edge_count();
        stats.volume = mesh.signed_volume();
        stats.area = mesh.surface_area();
        stats.component_count = mesh.component_count();
        stats.degenerate_face_count = mesh
            .triangles()
            .filter(|t| t.is_degenerate(self.degenerate_area_epsilon))
            .count();

        if !stats.is_watertight {
            errors.push(ErrorCode::NotWatertight);
        }
        if stats.volume.is_nan() || stats.volume <= 0.0 {
            errors.push(ErrorCode::InvalidGeometry);
        }

        if stats.component_count > 1 {
            warnings.push(WarningCode::MultipleComponents);
        }
        if self.check_self_intersections && has_self_intersections(mesh) {
            warnings.push(WarningCode::SelfIntersection);
        }
        if stats.volume > 0.0 && stats.volume < self.min_volume_mm3 {
            warnings.push(WarningCode::SmallVolume);
        }
        if stats.face_count > self.max_face_count {
            warnings.push(WarningCode::HighPolygonCount);
        }
        if stats.degenerate_face_count > 0 {
            warnings.push(WarningCode::DegenerateFaces);
        }

        let result = ValidationResult::new(errors, warnings, stats);
        debug!("{}", result);
        log_validation_result(&result);
        result
    }

    /// Validate and, on success, wrap the mesh as exportable.
    pub fn certify(&self, mesh: Mesh) -> Result<ValidatedMesh, RejectedMesh> {
        let validation = self.validate(&mesh);
        ValidatedMesh::from_validation(mesh, validation)
    }
}
