mod utilities;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use shared::errors::RenderError;
use tokio::process::Command;
use tracing::{debug, info, trace};

use crate::rendering::runner::utilities::{
    fill_argument_template,
    locate_rendered_image,
    parse_argument_template,
    parse_shell_arguments,
    FrameArguments,
};

/// POV-Ray invocation rendering one frame of an animation whose clock spans all frames.
pub const DEFAULT_RENDERER_ARGUMENTS: &str =
    "+I{scene} +O{output} +FN -D -V +KFI1 +KFF{total_frames} +SF{frame} +EF{frame}";

/// Name the renderer is asked to write each frame to (inside a per-frame directory).
const FRAME_OUTPUT_FILE_NAME: &str = "image.png";


/// Runs the external renderer for single frames.
pub struct FrameRenderer {
    renderer_binary_path: PathBuf,

    renderer_prepend_arguments: Vec<String>,

    argument_template: Vec<String>,

    renderer_append_arguments: Vec<String>,
}

impl FrameRenderer {
    pub fn new(
        renderer_binary_path: PathBuf,
        argument_template: &str,
        renderer_prepend_arguments: Option<&str>,
        renderer_append_arguments: Option<&str>,
    ) -> Result<Self, RenderError> {
        let argument_template = parse_argument_template(argument_template)?;
        let renderer_prepend_arguments = parse_shell_arguments(renderer_prepend_arguments)?;
        let renderer_append_arguments = parse_shell_arguments(renderer_append_arguments)?;

        debug!(
            template = ?argument_template,
            prepend = ?renderer_prepend_arguments,
            append = ?renderer_append_arguments,
            "Parsed renderer arguments."
        );

        Ok(Self {
            renderer_binary_path,
            renderer_prepend_arguments,
            argument_template,
            renderer_append_arguments,
        })
    }

    /// Renders `frame_index` of `scene_file_path` and returns the encoded image.
    ///
    /// The renderer runs inside a fresh `frame-<index>` directory below
    /// `working_directory`, which is removed again once the image has been read.
    pub async fn render_frame(
        &self,
        scene_file_path: &Path,
        total_frames: usize,
        frame_index: usize,
        working_directory: &Path,
    ) -> Result<Vec<u8>, RenderError> {
        let frame_directory = working_directory.join(format!("frame-{frame_index}"));
        tokio::fs::create_dir_all(&frame_directory)
            .await
            .map_err(RenderError::WorkingDirectory)?;

        let output_file_path = frame_directory.join(FRAME_OUTPUT_FILE_NAME);

        let mut renderer_args = self.renderer_prepend_arguments.clone();
        renderer_args.extend(fill_argument_template(
            &self.argument_template,
            &FrameArguments {
                scene_file_path,
                total_frames,
                frame_index,
                output_file_path: &output_file_path,
            },
        ));
        renderer_args.extend(self.renderer_append_arguments.iter().cloned());

        debug!(frame_index, arguments = ?renderer_args, "Starting renderer.");
        let render_start = Instant::now();

        let output = Command::new(&self.renderer_binary_path)
            .args(&renderer_args)
            .current_dir(&frame_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                frame_index,
                source,
            })?;

        trace!(
            frame_index,
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Renderer output."
        );

        if !output.status.success() {
            debug!(
                frame_index,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Renderer failed."
            );

            return Err(RenderError::RendererExit {
                frame_index,
                status: output.status,
            });
        }

        let image_path = locate_rendered_image(&frame_directory, &output_file_path)
            .map_err(|source| RenderError::ReadImage {
                frame_index,
                source,
            })?
            .ok_or(RenderError::MissingImage { frame_index })?;

        let image = tokio::fs::read(&image_path)
            .await
            .map_err(|source| RenderError::ReadImage {
                frame_index,
                source,
            })?;

        if image.is_empty() {
            return Err(RenderError::MissingImage { frame_index });
        }

        // Frames are held in memory from here on.
        if let Err(error) = tokio::fs::remove_dir_all(&frame_directory).await {
            debug!(frame_index, %error, "Could not remove frame directory.");
        }

        info!(
            frame_index,
            bytes = image.len(),
            "Rendered frame in {:.4} seconds.",
            render_start.elapsed().as_secs_f64()
        );

        Ok(image)
    }
}
