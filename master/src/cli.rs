use std::path::PathBuf;

use clap::Parser;

/// Renders a POV-Ray animation on the cluster and saves it locally.
#[derive(Parser)]
pub struct CLIArgs {
    #[arg(help = "Scene description file (.pov) to render.")]
    pub scene_file_path: PathBuf,

    #[arg(help = "Where the merged animation is saved.")]
    pub output_file_path: PathBuf,

    #[arg(long = "frames", help = "Number of animation frames to render.")]
    pub frames: usize,

    #[arg(
        long = "chunkSize",
        help = "Frames per worker task (overrides the configuration file)."
    )]
    pub chunk_size: Option<usize>,

    #[arg(
        long = "config",
        default_value = "render.toml",
        help = "Path to the TOML configuration file."
    )]
    pub configuration_file_path: PathBuf,

    #[arg(long = "logFilePath", help = "Also write logs to this file.")]
    pub log_file_path: Option<PathBuf>,
}
