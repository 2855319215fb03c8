//! meshprep process command - full pipeline from file to file.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{PipelineOutcome, ProcessingPipeline, load_stl};

use super::{pipeline_config, stl_format};
use crate::{Cli, OutputFormat, PipelineArgs, output};

pub fn run(input: &Path, output_path: &Path, args: &PipelineArgs, cli: &Cli) -> Result<bool> {
    let mesh = load_stl(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let pipeline = ProcessingPipeline::new(pipeline_config(args)?)?;
    let outcome = pipeline.process_and_save(mesh, output_path, stl_format(args.ascii))?;

    report(&outcome, cli);
    Ok(outcome.is_valid())
}

/// Print a pipeline outcome in the selected format.
pub fn report(outcome: &PipelineOutcome, cli: &Cli) {
    match cli.format {
        OutputFormat::Json => output::print(&outcome.report(), cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return;
            }
            println!("{}", "Pipeline Report".bold().underline());
            let stages: Vec<String> = outcome
                .stages
                .iter()
                .map(|s| format!("{:?}", s).to_lowercase())
                .collect();
            println!("  {}: {}", "Stages".cyan(), stages.join(" → "));

            if let Some(summary) = &outcome.repair {
                if summary.was_watertight {
                    println!("  {}: already watertight", "Repair".cyan());
                } else {
                    println!(
                        "  {}: {}/{} holes filled, {} faces flipped, {} components removed",
                        "Repair".cyan(),
                        summary.holes_filled,
                        summary.holes_found,
                        summary.faces_flipped + summary.faces_reoriented,
                        summary.components_removed
                    );
                }
            }

            let stats = outcome.validation.stats();
            println!(
                "  {}: {} vertices, {} faces",
                "Mesh".cyan(),
                stats.vertex_count,
                stats.face_count
            );
            if let Some([dx, dy, dz]) = stats.dimensions {
                println!(
                    "  {}: {:.2} x {:.2} x {:.2} mm",
                    "Dimensions".cyan(),
                    dx,
                    dy,
                    dz
                );
            }
            println!("  {}: {:.2} mm³", "Volume".cyan(), stats.volume);
            println!("  {}: {}", "Watertight".cyan(), output::yes_no(stats.is_watertight));

            for warning in outcome.validation.warnings() {
                println!(
                    "  {} [{}] {}",
                    "⚠".yellow(),
                    warning,
                    warning.description()
                );
            }
            for error in outcome.validation.errors() {
                println!("  {} [{}] {}", "✗".red(), error, error.description());
            }

            match &outcome.output_path {
                Some(path) => output::success(&format!("Saved {}", path.display()), false),
                None if outcome.is_valid() => output::success("Mesh is printable", false),
                None => output::failure("Mesh rejected, nothing written", false),
            }
        }
    }
}
