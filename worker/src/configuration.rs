use std::path::PathBuf;

use serde::Deserialize;

use crate::rendering::runner::DEFAULT_RENDERER_ARGUMENTS;

/// Settings of the packaged worker program, read from a TOML file.
///
/// ```toml
/// tools_directory = "/tmp/animation-render-tools"
/// chunk_parallelism = 4
///
/// [renderer]
/// binary = "povray"
/// arguments = "+I{scene} +O{output} +FN -D -V +KFI1 +KFF{total_frames} +SF{frame} +EF{frame}"
/// append_arguments = "+W640 +H480"
///
/// [encoder]
/// binary = "gm"
/// staging_source = "/opt/bundle/gm"
/// ```
#[derive(Deserialize, Debug)]
pub struct WorkerConfiguration {
    #[serde(default)]
    pub renderer: RendererConfiguration,

    #[serde(default)]
    pub encoder: EncoderConfiguration,

    /// Where staged tool copies are placed.
    #[serde(default = "default_tools_directory")]
    pub tools_directory: PathBuf,

    /// How many chunks are rendered at the same time.
    #[serde(default = "default_chunk_parallelism")]
    pub chunk_parallelism: usize,
}

impl Default for WorkerConfiguration {
    fn default() -> Self {
        Self {
            renderer: RendererConfiguration::default(),
            encoder: EncoderConfiguration::default(),
            tools_directory: default_tools_directory(),
            chunk_parallelism: default_chunk_parallelism(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct RendererConfiguration {
    #[serde(default = "default_renderer_binary")]
    pub binary: String,

    pub staging_source: Option<PathBuf>,

    /// Supports the `{scene}`, `{total_frames}`, `{frame}` and `{output}` placeholders.
    #[serde(default = "default_renderer_arguments")]
    pub arguments: String,

    pub prepend_arguments: Option<String>,

    pub append_arguments: Option<String>,
}

impl Default for RendererConfiguration {
    fn default() -> Self {
        Self {
            binary: default_renderer_binary(),
            staging_source: None,
            arguments: default_renderer_arguments(),
            prepend_arguments: None,
            append_arguments: None,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct EncoderConfiguration {
    #[serde(default = "default_encoder_binary")]
    pub binary: String,

    pub staging_source: Option<PathBuf>,
}

impl Default for EncoderConfiguration {
    fn default() -> Self {
        Self {
            binary: default_encoder_binary(),
            staging_source: None,
        }
    }
}

fn default_tools_directory() -> PathBuf {
    std::env::temp_dir().join("animation-render-tools")
}

fn default_chunk_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(1)
}

fn default_renderer_binary() -> String {
    "povray".to_string()
}

fn default_renderer_arguments() -> String {
    DEFAULT_RENDERER_ARGUMENTS.to_string()
}

fn default_encoder_binary() -> String {
    "gm".to_string()
}


#[cfg(test)]
mod tests {
    use shared::configuration::parse_from_str;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let configuration: WorkerConfiguration = parse_from_str("").unwrap();

        assert_eq!(configuration.renderer.binary, "povray");
        assert_eq!(configuration.renderer.arguments, DEFAULT_RENDERER_ARGUMENTS);
        assert_eq!(configuration.encoder.binary, "gm");
        assert!(configuration.chunk_parallelism >= 1);
    }

    #[test]
    fn overrides_are_read() {
        let configuration: WorkerConfiguration = parse_from_str(
            r#"
            chunk_parallelism = 2
            tools_directory = "/var/tools"

            [renderer]
            binary = "/usr/bin/povray"
            append_arguments = "+W320 +H240"

            [encoder]
            staging_source = "/opt/bundle/gm"
            "#,
        )
        .unwrap();

        assert_eq!(configuration.chunk_parallelism, 2);
        assert_eq!(configuration.tools_directory, PathBuf::from("/var/tools"));
        assert_eq!(configuration.renderer.binary, "/usr/bin/povray");
        assert_eq!(
            configuration.renderer.append_arguments.as_deref(),
            Some("+W320 +H240")
        );
        assert_eq!(
            configuration.encoder.staging_source,
            Some(PathBuf::from("/opt/bundle/gm"))
        );
    }
}
