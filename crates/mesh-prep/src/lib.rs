//! Prepare triangle meshes for 3D printing.
//!
//! A raw mesh (from a scanner, a generator, or an STL file) goes through
//! three stages before it may be written:
//!
//! 1. **Repair**: close holes, make winding consistent, point normals
//!    outward, drop small floating fragments.
//! 2. **Scale**: uniformly resize so one bounding-box extent hits a target
//!    size in millimeters, then center the bounding box on the origin.
//! 3. **Validate**: check watertightness and volume, collect advisory
//!    warnings, and certify the result.
//!
//! Export only accepts a [`ValidatedMesh`], so an unprintable mesh cannot
//! reach disk.
//!
//! # Units and Winding
//!
//! **All lengths are millimeters.** Faces are wound counter-clockwise when
//! viewed from outside, so normals point outward by the right-hand rule and
//! closed meshes have positive signed volume.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_prep::{PipelineConfig, ProcessingPipeline, StlFormat, load_stl};
//!
//! let mesh = load_stl("generated.stl")?;
//! let pipeline = ProcessingPipeline::new(PipelineConfig::default())?;
//! let outcome = pipeline.process_and_save(mesh, "print_ready.stl", StlFormat::Binary)?;
//!
//! println!("{}", outcome.validation);
//! # Ok::<(), mesh_prep::MeshError>(())
//! ```
//!
//! # Individual Stages
//!
//! ```no_run
//! use mesh_prep::{MeshRepairer, PrintabilityValidator, ScaleAxis, ScaleNormalizer, load_stl};
//!
//! let mesh = load_stl("scan.stl")?;
//! let (mesh, summary) = MeshRepairer::default().repair_with_summary(mesh);
//! println!("{}", summary);
//!
//! let mesh = ScaleNormalizer::new(60.0, ScaleAxis::Z).normalize(mesh)?;
//! match PrintabilityValidator::default().certify(mesh) {
//!     Ok(validated) => println!("printable: {}", validated.validation()),
//!     Err(rejected) => println!("rejected: {:?}", rejected.validation.errors()),
//! }
//! # Ok::<(), mesh_prep::MeshError>(())
//! ```
//!
//! # Logging
//!
//! Stages log through `tracing`. See [`tracing_ext`] for the targets.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod config;
mod error;
mod pipeline;
mod scale;
mod source;
pub mod tracing_ext;
mod types;

pub mod adjacency;
pub mod components;
pub mod holes;
pub mod intersect;
pub mod io;
pub mod repair;
pub mod validate;
pub mod winding;

pub use error::{MeshError, MeshErrorCode, MeshResult, RecoverySuggestion};

pub use types::{Mesh, Triangle, Vertex};

pub use adjacency::MeshAdjacency;

pub use components::{ComponentAnalysis, find_connected_components, prune_small_components};
pub use holes::{BoundaryLoop, FillStrategy, HoleFillReport, detect_holes, fill_holes};
pub use intersect::{
    IntersectionParams, SelfIntersectionResult, detect_self_intersections, has_self_intersections,
};
pub use winding::{fix_winding_order, orient_outward};

pub use repair::{MeshRepairer, RepairParams, RepairSummary, repair_mesh};

pub use scale::{ScaleAxis, ScaleNormalizer, normalize};

pub use validate::{
    ErrorCode, MeshStats, PrintabilityValidator, RejectedMesh, ValidatedMesh, ValidationResult,
    WarningCode,
};

pub use config::{PipelineConfig, TARGET_SIZE_RANGE};
pub use pipeline::{
    PipelineOutcome, PipelineReport, PipelineStage, ProcessingPipeline, process,
};

pub use io::{StlFormat, load_stl, save_stl};

pub use source::{ExternalModelSource, MeshSource, MockShape, MockShapeSource};

pub use tracing_ext::{OperationTimer, log_io_operation, log_mesh_stats, log_validation_result};

// Convenience methods on Mesh
impl Mesh {
    /// Load an STL file.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        io::load_stl(path)
    }

    /// Validate with default thresholds.
    pub fn validate(&self) -> ValidationResult {
        PrintabilityValidator::default().validate(self)
    }

    /// Repair with default parameters.
    pub fn repaired(self) -> Mesh {
        MeshRepairer::default().repair(self)
    }

    /// Find connected components in the mesh.
    pub fn find_components(&self) -> ComponentAnalysis {
        components::find_connected_components(self)
    }

    /// Check for self-intersecting triangles.
    pub fn has_self_intersections(&self) -> bool {
        intersect::has_self_intersections(self)
    }
}
