use std::path::Path;

use shared::errors::RenderError;
use shared::frames::{ChunkDescriptor, FrameRecord};
use tracing::info;

use crate::rendering::runner::FrameRenderer;

/// Renders every frame of one chunk, tagging all records with the same group key.
pub struct WorkerTask<'a> {
    renderer: &'a FrameRenderer,

    scene_file_path: &'a Path,

    group_key: u32,
}

impl<'a> WorkerTask<'a> {
    pub fn new(renderer: &'a FrameRenderer, scene_file_path: &'a Path, group_key: u32) -> Self {
        Self {
            renderer,
            scene_file_path,
            group_key,
        }
    }

    /// Frames are rendered in order; the first failing frame fails the whole task.
    pub async fn render(&self, chunk: &ChunkDescriptor) -> Result<Vec<FrameRecord>, RenderError> {
        let working_directory = tempfile::Builder::new()
            .prefix("render-task-")
            .tempdir()
            .map_err(RenderError::WorkingDirectory)?;

        info!(chunk = %chunk, "Starting to render chunk.");

        let mut frames = Vec::with_capacity(chunk.num_frames());
        for frame_index in chunk.frame_indices() {
            let image = self
                .renderer
                .render_frame(
                    self.scene_file_path,
                    chunk.total_frames,
                    frame_index,
                    working_directory.path(),
                )
                .await?;

            frames.push(FrameRecord::new(self.group_key, frame_index, image));
        }

        info!(chunk = %chunk, "Finished rendering chunk.");
        Ok(frames)
    }
}
