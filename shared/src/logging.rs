use std::path::Path;

use miette::Result;
use miette::{miette, Context, IntoDiagnostic};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Initialize console logging and, if `log_file_path` is `Some`, plain-text file logging.
///
/// The console filter comes from `RUST_LOG` and falls back to `INFO`.
///
/// **IMPORTANT: Retain the returned `Option<WorkerGuard>` in scope, otherwise flushing to file will stop.**
///
/// ## Example
/// ```no_run
/// use miette::Result;
/// use shared::logging::initialize_console_and_file_logging;
/// use std::path::PathBuf;
///
/// fn main() -> Result<()> {
///     let log_file = PathBuf::from("logs/master.log");
///     let _guard = initialize_console_and_file_logging(Some(log_file.as_path()))?;
///
///     // _guard will drop at the end of main.
///     Ok(())
/// }
/// ```
pub fn initialize_console_and_file_logging(
    log_file_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let (log_file_writer, guard) = match log_file_path {
        Some(output_path) => {
            let directory = output_path
                .parent()
                .ok_or_else(|| miette!("Could not parse --logFilePath's parent directory path."))?;

            let file_name = output_path
                .file_name()
                .ok_or_else(|| miette!("Could not parse --logFilePath's file name."))?;

            let (non_blocking_appender, guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::never(directory, file_name),
            );

            (Some(non_blocking_appender), Some(guard))
        }
        None => (None, None),
    };


    let console_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let console_subscriber = tracing_subscriber::fmt()
        .with_env_filter(console_filter)
        .with_writer(std::io::stderr)
        .finish();

    let file_layer = log_file_writer.map(|writer| {
        tracing_subscriber::fmt::Layer::default()
            .with_ansi(false)
            .with_writer(writer)
    });

    tracing::subscriber::set_global_default(console_subscriber.with(file_layer))
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to set up logging."))?;


    Ok(guard)
}
