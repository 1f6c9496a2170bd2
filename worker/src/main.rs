mod cli;
mod configuration;
mod jobs;
mod merging;
mod rendering;
#[cfg(all(test, unix))]
mod testing;

use clap::Parser;
use miette::{miette, Context, IntoDiagnostic, Result};
use shared::configuration::load_from_file;
use shared::logging::initialize_console_and_file_logging;
use shared::tools::ensure_tool_available;
use tracing::info;

use crate::cli::CLIArgs;
use crate::configuration::WorkerConfiguration;
use crate::jobs::{AnimationJob, AnimationJobRunner};
use crate::merging::FrameMerger;
use crate::rendering::runner::FrameRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CLIArgs::parse();
    let _guard = initialize_console_and_file_logging(args.log_file_path.as_deref())?;

    let configuration: WorkerConfiguration = match &args.configuration_file_path {
        Some(path) => load_from_file(path)?,
        None => WorkerConfiguration::default(),
    };

    info!("Ensuring renderer and encoder are available.");
    let renderer_binary_path = ensure_tool_available(
        &configuration.renderer.binary,
        configuration.renderer.staging_source.as_deref(),
        &configuration.tools_directory,
    )
    .into_diagnostic()
    .wrap_err_with(|| miette!("Renderer is not available."))?;

    let encoder_binary_path = ensure_tool_available(
        &configuration.encoder.binary,
        configuration.encoder.staging_source.as_deref(),
        &configuration.tools_directory,
    )
    .into_diagnostic()
    .wrap_err_with(|| miette!("Encoder is not available."))?;

    let renderer = FrameRenderer::new(
        renderer_binary_path,
        &configuration.renderer.arguments,
        configuration.renderer.prepend_arguments.as_deref(),
        configuration.renderer.append_arguments.as_deref(),
    )
    .into_diagnostic()?;

    let runner = AnimationJobRunner::new(
        renderer,
        FrameMerger::new(encoder_binary_path),
        configuration.chunk_parallelism,
    );

    let job = AnimationJob {
        input_location: args.input_location,
        output_location: args.output_location,
        scene_location: args.scene_location,
    };

    info!(
        input = %job.input_location,
        output = %job.output_location,
        scene = %job.scene_location,
        "Running animation job."
    );
    runner.run(&job).await?;

    info!("Animation job finished.");
    Ok(())
}
