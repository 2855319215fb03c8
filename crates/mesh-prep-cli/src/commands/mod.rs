//! Subcommand implementations.
//!
//! Each `run` returns `Ok(true)` on success and `Ok(false)` when the mesh was
//! rejected, so `main` can map the result to an exit code.

pub mod generate;
pub mod info;
pub mod process;
pub mod repair;
pub mod validate;

use anyhow::{Context, Result};
use mesh_prep::{PipelineConfig, StlFormat};

use crate::PipelineArgs;

/// Start from the config file (or defaults) and apply flag overrides.
pub fn pipeline_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load pipeline config from {:?}", path))?,
        None => PipelineConfig::default(),
    };

    if let Some(size) = args.target_size {
        config.target_size_mm = size;
    }
    if let Some(axis) = args.axis {
        config.scale_axis = axis;
    }
    if let Some(fraction) = args.component_fraction {
        config.small_component_fraction = fraction;
    }
    if args.no_center {
        config.center_at_origin = false;
    }
    if args.no_repair {
        config.auto_repair = false;
    }
    if args.no_scale {
        config.auto_scale = false;
    }
    if args.no_intersections {
        config.check_self_intersections = false;
    }

    config.check()?;
    Ok(config)
}

pub fn stl_format(ascii: bool) -> StlFormat {
    if ascii {
        StlFormat::Ascii
    } else {
        StlFormat::Binary
    }
}
