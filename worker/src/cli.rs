use std::path::PathBuf;

use clap::Parser;

/// Renders and merges every chunk listed in the input location.
#[derive(Parser)]
pub struct CLIArgs {
    #[arg(help = "Location of the chunk descriptors, e.g. s3://bucket/input/.")]
    pub input_location: String,

    #[arg(help = "Location the merged animation is written to, e.g. s3://bucket/output/.")]
    pub output_location: String,

    #[arg(help = "Location of the scene description, e.g. s3://bucket/render.pov.")]
    pub scene_location: String,

    #[arg(long = "config", help = "Path to the worker's TOML configuration file.")]
    pub configuration_file_path: Option<PathBuf>,

    #[arg(long = "logFilePath", help = "Also write logs to this file.")]
    pub log_file_path: Option<PathBuf>,
}
