use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::PartitionError;
use crate::frames::{partition, ChunkDescriptor, DEFAULT_FRAMES_PER_TASK};

/// A single animation render, as requested by the caller.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct RenderRequest {
    pub scene_file_path: PathBuf,

    pub total_frames: usize,

    /// Maximum number of frames rendered by one worker task.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_FRAMES_PER_TASK
}

impl RenderRequest {
    pub fn new<P: Into<PathBuf>>(scene_file_path: P, total_frames: usize, chunk_size: usize) -> Self {
        Self {
            scene_file_path: scene_file_path.into(),
            total_frames,
            chunk_size,
        }
    }

    pub fn chunks(&self) -> Result<Vec<ChunkDescriptor>, PartitionError> {
        partition(self.total_frames, self.chunk_size)
    }

    pub fn scene_file_name(&self) -> String {
        self.scene_file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.scene_file_path.to_string_lossy().to_string())
    }

    /// Human-readable name of the cluster job step for this request.
    pub fn step_name(&self) -> String {
        format!("render {} '{}'", self.total_frames, self.scene_file_name())
    }

    pub fn scene_file(&self) -> &Path {
        &self.scene_file_path
    }
}
