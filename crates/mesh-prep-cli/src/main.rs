//! meshprep: repair, scale and validate meshes for 3D printing.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_prep=info` - Stage summaries
//! - `RUST_LOG=mesh_prep=debug` - Detailed stage logging
//! - `RUST_LOG=mesh_prep::timing=info` - Stage timings only
//!
//! # Example
//!
//! ```bash
//! # Full pipeline: repair, scale to 80 mm, validate, save
//! meshprep process raw.stl -o print.stl --target-size 80
//!
//! # Check a file without touching it
//! RUST_LOG=mesh_prep=debug meshprep validate print.stl
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use mesh_prep::{MockShape, ScaleAxis};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{generate, info, process, repair, validate};

/// meshprep - prepare triangle meshes for 3D printing.
///
/// Repairs holes and winding, scales to a target size and refuses to write
/// anything that is not watertight with positive volume.
#[derive(Parser)]
#[command(name = "meshprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Pipeline overrides shared by `process` and `generate`.
#[derive(clap::Args, Clone, Default)]
pub struct PipelineArgs {
    /// Load pipeline settings from a TOML file (flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target size in mm for the scaled axis
    #[arg(long)]
    target_size: Option<f64>,

    /// Axis matched to the target size (longest, shortest, x, y, z)
    #[arg(long)]
    axis: Option<ScaleAxis>,

    /// Keep the scaled position instead of centering on the origin
    #[arg(long)]
    no_center: bool,

    /// Skip the repair stage
    #[arg(long)]
    no_repair: bool,

    /// Skip the scale stage
    #[arg(long)]
    no_scale: bool,

    /// Drop components below this fraction of the total vertex count
    #[arg(long)]
    component_fraction: Option<f64>,

    /// Skip the self-intersection scan
    #[arg(long)]
    no_intersections: bool,

    /// Write ASCII STL instead of binary
    #[arg(long)]
    ascii: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair, scale and validate a mesh, then save it if it is printable
    Process {
        /// Input STL file
        input: PathBuf,

        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Validate a mesh for printability
    Validate {
        /// Input STL file
        input: PathBuf,

        /// Skip the self-intersection scan
        #[arg(long)]
        no_intersections: bool,
    },

    /// Repair a mesh without scaling it
    Repair {
        /// Input STL file
        input: PathBuf,

        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,

        /// Largest convex hole closed by ear clipping
        #[arg(long)]
        max_ear_clip: Option<usize>,

        /// Vertex welding tolerance in mm
        #[arg(long)]
        weld_tolerance: Option<f64>,

        /// Write ASCII STL instead of binary
        #[arg(long)]
        ascii: bool,
    },

    /// Generate a mesh from a source and run it through the pipeline
    Generate {
        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,

        /// Built-in shape (box, sphere, cylinder)
        #[arg(long, default_value = "box")]
        shape: MockShape,

        /// Shape size in mm
        #[arg(long, default_value = "50.0")]
        size: f64,

        /// Segments around round shapes
        #[arg(long, default_value = "32")]
        resolution: usize,

        /// Prompt passed to the generator
        #[arg(long, default_value = "")]
        prompt: String,

        /// External generator program; replaces the built-in shape
        #[arg(long)]
        program: Option<String>,

        /// Generator argument; `{prompt}` and `{output}` are substituted
        #[arg(long = "arg", requires = "program")]
        program_args: Vec<String>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Display mesh statistics
    Info {
        /// Input STL file
        input: PathBuf,

        /// Show volume and surface area
        #[arg(long)]
        detailed: bool,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_prep=info",
            2 => "mesh_prep=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Process {
            input,
            output,
            pipeline,
        } => process::run(input, output, pipeline, cli),
        Commands::Validate {
            input,
            no_intersections,
        } => validate::run(input, *no_intersections, cli),
        Commands::Repair {
            input,
            output,
            max_ear_clip,
            weld_tolerance,
            ascii,
        } => repair::run(input, output, *max_ear_clip, *weld_tolerance, *ascii, cli),
        Commands::Generate {
            output,
            shape,
            size,
            resolution,
            prompt,
            program,
            program_args,
            pipeline,
        } => {
            let source = generate::SourceArgs {
                shape: *shape,
                size: *size,
                resolution: *resolution,
                program: program.clone(),
                program_args: program_args.clone(),
            };
            generate::run(output, &source, prompt, pipeline, cli)
        }
        Commands::Info { input, detailed } => info::run(input, *detailed, cli),
    }
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            if !cli.quiet {
                if let Some(mesh_err) = e.downcast_ref::<mesh_prep::MeshError>() {
                    eprintln!("{}: {}", "Error".red().bold(), mesh_err);
                    eprintln!("  {}: {}", "Code".cyan(), mesh_err.code());
                    eprintln!(
                        "  {}: {}",
                        "Suggestion".green(),
                        mesh_err.recovery_suggestion()
                    );
                    if let Some(location) = mesh_err.location() {
                        eprintln!("  {}: {}", "Location".yellow(), location.display());
                    }
                } else {
                    eprintln!("{}: {}", "Error".red().bold(), e);
                    for cause in e.chain().skip(1) {
                        eprintln!("  {}: {}", "Caused by".yellow(), cause);
                    }
                }
            }
            std::process::exit(1);
        }
    }
}
