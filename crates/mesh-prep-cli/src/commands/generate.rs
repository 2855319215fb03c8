//! meshprep generate command - produce a mesh from a source and prepare it.

use std::path::Path;

use anyhow::Result;
use mesh_prep::{ExternalModelSource, MeshSource, MockShape, MockShapeSource, ProcessingPipeline};

use super::{pipeline_config, process, stl_format};
use crate::{Cli, PipelineArgs};

/// Which source to run and how to build it.
pub struct SourceArgs {
    pub shape: MockShape,
    pub size: f64,
    pub resolution: usize,
    pub program: Option<String>,
    pub program_args: Vec<String>,
}

impl SourceArgs {
    fn build(&self) -> Box<dyn MeshSource> {
        match &self.program {
            Some(program) => {
                let mut source = ExternalModelSource::new(program.as_str(), program.as_str());
                if !self.program_args.is_empty() {
                    source = source.with_args(self.program_args.iter().cloned());
                }
                Box::new(source)
            }
            None => Box::new(
                MockShapeSource::new(self.shape, self.size).with_resolution(self.resolution),
            ),
        }
    }
}

pub fn run(
    output_path: &Path,
    source: &SourceArgs,
    prompt: &str,
    args: &PipelineArgs,
    cli: &Cli,
) -> Result<bool> {
    let pipeline = ProcessingPipeline::new(pipeline_config(args)?)?;
    let source = source.build();

    let outcome =
        pipeline.run_source(source.as_ref(), prompt, output_path, stl_format(args.ascii))?;

    process::report(&outcome, cli);
    Ok(outcome.is_valid())
}
