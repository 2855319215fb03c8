//! meshprep validate command - check a mesh for printability.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{PrintabilityValidator, ValidationResult, load_stl};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct ValidateReport<'a> {
    path: String,
    #[serde(flatten)]
    result: &'a ValidationResult,
}

pub fn run(input: &Path, no_intersections: bool, cli: &Cli) -> Result<bool> {
    let mesh = load_stl(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let validator = PrintabilityValidator::default().with_self_intersection_check(!no_intersections);
    let result = validator.validate(&mesh);

    match cli.format {
        OutputFormat::Json => {
            let report = ValidateReport {
                path: input.display().to_string(),
                result: &result,
            };
            output::print(&report, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Validation Report".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());

                if result.is_valid() {
                    println!("  {}: {}", "Status".cyan(), "Printable".green().bold());
                } else {
                    println!("  {}: {}", "Status".cyan(), "Rejected".red().bold());
                }

                let stats = result.stats();
                println!("  {}: {}", "Watertight".cyan(), output::yes_no(stats.is_watertight));
                println!("  {}: {:.2} mm³", "Volume".cyan(), stats.volume);
                println!("  {}: {}", "Components".cyan(), stats.component_count);
                if stats.boundary_edge_count > 0 {
                    println!(
                        "  {}: {}",
                        "Boundary edges".yellow(),
                        stats.boundary_edge_count
                    );
                }

                if !result.errors().is_empty() || !result.warnings().is_empty() {
                    println!("\n{}", "Issues:".bold());
                }
                for error in result.errors() {
                    println!("  {} [{}] {}", "✗".red(), error, error.description());
                }
                for warning in result.warnings() {
                    println!(
                        "  {} [{}] {}",
                        "⚠".yellow(),
                        warning,
                        warning.description()
                    );
                }
            }
        }
    }

    Ok(result.is_valid())
}
