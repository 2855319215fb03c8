//! Repair, scale, validate, persist.
//!
//! [`ProcessingPipeline`] moves a mesh through a fixed sequence of stages
//! and always hands back a [`PipelineOutcome`]. Only meshes that pass
//! validation come back as a [`ValidatedMesh`], and only those reach disk.
//!
//! # Example
//!
//! ```no_run
//! use mesh_prep::{PipelineConfig, ProcessingPipeline, StlFormat, load_stl};
//!
//! let pipeline = ProcessingPipeline::new(PipelineConfig::with_target_size(80.0))?;
//! let mesh = load_stl("scan.stl")?;
//! let outcome = pipeline.process_and_save(mesh, "print.stl", StlFormat::Binary)?;
//!
//! if !outcome.is_valid() {
//!     eprintln!("{}", outcome.validation);
//! }
//! # Ok::<(), mesh_prep::MeshError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::Mesh;
use crate::config::PipelineConfig;
use crate::error::{MeshError, MeshResult};
use crate::io::{StlFormat, save_stl};
use crate::repair::{MeshRepairer, RepairParams, RepairSummary};
use crate::scale::ScaleNormalizer;
use crate::source::MeshSource;
use crate::tracing_ext::{OperationTimer, log_mesh_stats};
use crate::validate::{ErrorCode, PrintabilityValidator, ValidatedMesh, ValidationResult};

/// States a mesh passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Raw,
    Repaired,
    Scaled,
    Validated,
    Persisted,
    Rejected,
}

#[derive(Debug, Clone)]
enum FinalMesh {
    Validated(ValidatedMesh),
    Rejected(Mesh),
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub validation: ValidationResult,
    /// Stage history, starting with [`PipelineStage::Raw`].
    pub stages: Vec<PipelineStage>,
    /// Present when repair ran.
    pub repair: Option<RepairSummary>,
    /// Set once the mesh has been written.
    pub output_path: Option<PathBuf>,
    pub operation_log: Vec<String>,
    mesh: FinalMesh,
}

impl PipelineOutcome {
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    /// The exportable mesh, if validation passed.
    pub fn validated_mesh(&self) -> Option<&ValidatedMesh> {
        match &self.mesh {
            FinalMesh::Validated(v) => Some(v),
            FinalMesh::Rejected(_) => None,
        }
    }

    pub fn into_validated(self) -> Option<ValidatedMesh> {
        match self.mesh {
            FinalMesh::Validated(v) => Some(v),
            FinalMesh::Rejected(_) => None,
        }
    }

    /// The final mesh, valid or not.
    pub fn mesh(&self) -> &Mesh {
        match &self.mesh {
            FinalMesh::Validated(v) => v.mesh(),
            FinalMesh::Rejected(m) => m,
        }
    }

    pub fn into_mesh(self) -> Mesh {
        match self.mesh {
            FinalMesh::Validated(v) => v.into_mesh(),
            FinalMesh::Rejected(m) => m,
        }
    }

    pub fn was_repaired(&self) -> bool {
        self.stages.contains(&PipelineStage::Repaired)
    }

    pub fn was_scaled(&self) -> bool {
        self.stages.contains(&PipelineStage::Scaled)
    }

    pub fn final_stage(&self) -> PipelineStage {
        self.stages.last().copied().unwrap_or(PipelineStage::Raw)
    }

    /// Serializable view for reports and telemetry.
    pub fn report(&self) -> PipelineReport<'_> {
        PipelineReport {
            is_valid: self.is_valid(),
            stages: &self.stages,
            validation: &self.validation,
            repair: self.repair.as_ref(),
            output_path: self.output_path.as_deref(),
            operation_log: &self.operation_log,
        }
    }
}

/// Borrowed, serializable summary of a [`PipelineOutcome`].
#[derive(Debug, Serialize)]
pub struct PipelineReport<'a> {
    pub is_valid: bool,
    pub stages: &'a [PipelineStage],
    pub validation: &'a ValidationResult,
    pub repair: Option<&'a RepairSummary>,
    pub output_path: Option<&'a Path>,
    pub operation_log: &'a [String],
}

/// Runs repair, scaling and validation with one configuration.
#[derive(Debug, Clone)]
pub struct ProcessingPipeline {
    config: PipelineConfig,
    repairer: MeshRepairer,
    normalizer: ScaleNormalizer,
    validator: PrintabilityValidator,
}

impl ProcessingPipeline {
    /// Build a pipeline, rejecting out-of-range settings.
    pub fn new(config: PipelineConfig) -> MeshResult<Self> {
        config.check()?;
        Ok(Self {
            repairer: MeshRepairer::new(RepairParams::from(&config)),
            normalizer: ScaleNormalizer::from_config(&config),
            validator: PrintabilityValidator::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Repair (optional), scale (optional) and validate `mesh`.
    ///
    /// Geometry defects are reported in the outcome, not as errors.
    ///
    /// # Errors
    ///
    /// [`MeshError::EmptyMesh`] when the input has no faces.
    pub fn process(&self, mesh: Mesh) -> MeshResult<PipelineOutcome> {
        if mesh.faces.is_empty() {
            return Err(MeshError::empty_mesh("input mesh has no faces"));
        }
        let _timer = OperationTimer::with_context("pipeline", &mesh);

        let mut mesh = mesh;
        let mut stages = vec![PipelineStage::Raw];
        let mut operation_log = vec![format!(
            "Received mesh: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        )];
        log_mesh_stats(&mesh, "raw");

        let mut repair = None;
        if self.config.auto_repair {
            let (repaired, summary) = self.repairer.repair_with_summary(mesh);
            mesh = repaired;
            operation_log.push(if summary.was_watertight {
                "Repair skipped: already watertight".to_string()
            } else {
                format!(
                    "Repaired: filled {}/{} holes, flipped {} faces, removed {} components",
                    summary.holes_filled,
                    summary.holes_found,
                    summary.faces_flipped + summary.faces_reoriented,
                    summary.components_removed
                )
            });
            stages.push(PipelineStage::Repaired);
            repair = Some(summary);
        }

        let mut scale_failed = false;
        if self.config.auto_scale {
            match self.normalizer.scale_factor(&mesh) {
                Ok(factor) => {
                    mesh = self.normalizer.normalize(mesh)?;
                    operation_log.push(format!(
                        "Scaled by {:.6} to {} mm along {}",
                        factor, self.config.target_size_mm, self.config.scale_axis
                    ));
                    stages.push(PipelineStage::Scaled);
                }
                Err(e) => {
                    warn!("Scaling failed: {}", e);
                    operation_log.push(format!("Scale failed: {}", e));
                    scale_failed = true;
                }
            }
        }

        let mut validation = self.validator.validate(&mesh);
        if scale_failed {
            validation.push_error(ErrorCode::ScaleFailed);
        }
        stages.push(PipelineStage::Validated);

        let mesh = match ValidatedMesh::from_validation(mesh, validation.clone()) {
            Ok(validated) => {
                operation_log.push(format!(
                    "Validated: {} warning(s)",
                    validation.warnings().len()
                ));
                FinalMesh::Validated(validated)
            }
            Err(rejected) => {
                let codes: Vec<&str> = validation.errors().iter().map(|e| e.as_str()).collect();
                warn!("Mesh rejected: {}", codes.join(", "));
                operation_log.push(format!("Rejected: {}", codes.join(", ")));
                stages.push(PipelineStage::Rejected);
                FinalMesh::Rejected(rejected.mesh)
            }
        };

        Ok(PipelineOutcome {
            validation,
            stages,
            repair,
            output_path: None,
            operation_log,
            mesh,
        })
    }

    /// [`process`](Self::process), then write the mesh if it validated.
    /// A rejected mesh leaves `path` untouched.
    pub fn process_and_save(
        &self,
        mesh: Mesh,
        path: impl AsRef<Path>,
        format: StlFormat,
    ) -> MeshResult<PipelineOutcome> {
        let path = path.as_ref();
        let mut outcome = self.process(mesh)?;

        if let Some(validated) = outcome.validated_mesh() {
            save_stl(validated, path, format)?;
            outcome
                .operation_log
                .push(format!("Saved to {}", path.display()));
            outcome.stages.push(PipelineStage::Persisted);
            outcome.output_path = Some(path.to_path_buf());
            info!("Pipeline complete: saved {:?}", path);
        } else {
            info!("Pipeline complete: mesh rejected, nothing written");
        }

        Ok(outcome)
    }

    /// Produce a mesh from `source` and run it through the pipeline.
    pub fn run_source(
        &self,
        source: &dyn MeshSource,
        prompt: &str,
        path: impl AsRef<Path>,
        format: StlFormat,
    ) -> MeshResult<PipelineOutcome> {
        info!(source = source.name(), prompt, "Generating mesh");
        let mesh = source.produce(prompt)?;
        let mut outcome = self.process_and_save(mesh, path, format)?;
        outcome
            .operation_log
            .insert(0, format!("Generated by {} from '{}'", source.name(), prompt));
        Ok(outcome)
    }
}

/// Run the default stages with `config`.
pub fn process(mesh: Mesh, config: &PipelineConfig) -> MeshResult<PipelineOutcome> {
    ProcessingPipeline::new(config.clone())?.process(mesh)
}
