//! meshprep repair command - repair a mesh without scaling it.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{MeshRepairer, PrintabilityValidator, RepairParams, RepairSummary, load_stl};
use serde::Serialize;

use super::stl_format;
use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct RepairResult<'a> {
    input: String,
    output: Option<String>,
    success: bool,
    input_vertices: usize,
    input_faces: usize,
    output_vertices: usize,
    output_faces: usize,
    summary: &'a RepairSummary,
    errors: Vec<&'static str>,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    max_ear_clip: Option<usize>,
    weld_tolerance: Option<f64>,
    ascii: bool,
    cli: &Cli,
) -> Result<bool> {
    let mesh = load_stl(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;
    let input_vertices = mesh.vertex_count();
    let input_faces = mesh.face_count();

    let mut params = RepairParams::default();
    if let Some(max) = max_ear_clip {
        params.max_ear_clip_vertices = max;
    }
    if let Some(tolerance) = weld_tolerance {
        params.weld_epsilon = tolerance;
    }

    let (repaired, summary) = MeshRepairer::new(params).repair_with_summary(mesh);
    let output_vertices = repaired.vertex_count();
    let output_faces = repaired.face_count();

    // Repair alone does not make a mesh printable; the save still needs a certificate.
    let (saved, errors) = match PrintabilityValidator::default().certify(repaired) {
        Ok(validated) => {
            validated
                .save_stl(output_path, stl_format(ascii))
                .with_context(|| format!("Failed to save repaired mesh to {:?}", output_path))?;
            (true, Vec::new())
        }
        Err(rejected) => {
            let errors = rejected
                .validation
                .errors()
                .iter()
                .map(|e| e.as_str())
                .collect();
            (false, errors)
        }
    };

    let result = RepairResult {
        input: input.display().to_string(),
        output: saved.then(|| output_path.display().to_string()),
        success: saved,
        input_vertices,
        input_faces,
        output_vertices,
        output_faces,
        summary: &summary,
        errors,
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                if saved {
                    output::success(
                        &format!("Repaired mesh saved to {}", output_path.display()),
                        false,
                    );
                } else {
                    output::failure(
                        &format!("Repaired mesh is not printable: {}", result.errors.join(", ")),
                        false,
                    );
                }
                println!(
                    "  {}: {} → {} vertices",
                    "Vertices".cyan(),
                    input_vertices,
                    output_vertices
                );
                println!(
                    "  {}: {} → {} faces",
                    "Faces".cyan(),
                    input_faces,
                    output_faces
                );
                if summary.holes_filled > 0 {
                    println!(
                        "  {}: {} of {} holes filled",
                        "Repairs".green(),
                        summary.holes_filled,
                        summary.holes_found
                    );
                }
                if summary.faces_flipped + summary.faces_reoriented > 0 {
                    println!(
                        "  {}: {} faces flipped",
                        "Winding".green(),
                        summary.faces_flipped + summary.faces_reoriented
                    );
                }
                if summary.components_removed > 0 {
                    println!(
                        "  {}: {} small components removed",
                        "Cleanup".green(),
                        summary.components_removed
                    );
                }
            }
        }
    }

    Ok(saved)
}
