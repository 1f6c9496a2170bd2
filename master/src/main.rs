mod cli;
mod cluster;
mod configuration;
mod driver;
mod progress;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use miette::{miette, Context, IntoDiagnostic, Result};
use shared::configuration::load_from_file;
use shared::jobs::RenderRequest;
use shared::logging::initialize_console_and_file_logging;
use shared::storage::{ObjectStoreClient, StorageNamespace};
use tracing::{info, warn};

use crate::cli::CLIArgs;
use crate::cluster::local::LocalCluster;
use crate::configuration::MasterConfiguration;
use crate::driver::JobDriver;
use crate::progress::LoggingProgressListener;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CLIArgs::try_parse() {
        Ok(args) => args,
        Err(error) => {
            // --help and --version also end up here.
            let exit_code = if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };

            let _ = error.print();
            return exit_code;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CLIArgs) -> Result<()> {
    let _guard = initialize_console_and_file_logging(args.log_file_path.as_deref())?;

    info!("Loading configuration file.");
    let configuration: MasterConfiguration = load_from_file(&args.configuration_file_path)?;

    let namespace = StorageNamespace::new(&configuration.storage.base_url)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Invalid storage base URL."))?;
    let storage = ObjectStoreClient::from_url(&configuration.storage.base_url)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not open remote storage."))?;

    let program_arguments = match &configuration.cluster.program_arguments {
        Some(arguments) => shlex::split(arguments)
            .ok_or_else(|| miette!("Could not parse cluster program arguments: {arguments:?}"))?,
        None => Vec::new(),
    };

    let mut driver = JobDriver::new(
        Arc::new(storage),
        Arc::new(LocalCluster::new(program_arguments)),
        namespace,
        configuration
            .cluster
            .program_path
            .to_string_lossy()
            .to_string(),
        configuration.polling.to_settings()?,
    );
    driver
        .progress()
        .add_listener(Arc::new(LoggingProgressListener));

    let cancellation = driver.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, interrupting the render.");
            cancellation.cancel();
        }
    });

    let request = RenderRequest::new(
        args.scene_file_path,
        args.frames,
        args.chunk_size
            .unwrap_or(configuration.render.frames_per_task),
    );

    info!(
        scene = %request.scene_file_path.display(),
        frames = request.total_frames,
        chunk_size = request.chunk_size,
        "Rendering animation."
    );
    let render_result = driver.render(&request, &args.output_file_path).await;
    info!(state = ?driver.state(), "Render finished.");

    render_result
        .into_diagnostic()
        .wrap_err_with(|| miette!("Rendering {} failed.", request.scene_file_name()))?;

    info!(
        output = %args.output_file_path.display(),
        "Animation saved."
    );
    Ok(())
}
