use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Total frame count must be at least 1, got {0}.")]
    InvalidTotalFrames(usize),

    #[error("Chunk size must be at least 1, got {0}.")]
    InvalidChunkSize(usize),
}

#[derive(Error, Debug)]
pub enum ChunkDescriptorError {
    #[error("Malformed chunk descriptor line: {line:?}")]
    Malformed { line: String },

    #[error("Invalid chunk frame range {start_frame}..={end_frame} (of {total_frames} frames).")]
    InvalidRange {
        total_frames: usize,
        start_frame: usize,
        end_frame: usize,
    },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Could not prepare the render working directory.")]
    WorkingDirectory(#[source] io::Error),

    #[error("Invalid renderer arguments: {0}")]
    InvalidArguments(String),

    #[error("Failed while executing the renderer for frame {frame_index}.")]
    Spawn {
        frame_index: usize,
        #[source]
        source: io::Error,
    },

    #[error("Renderer exited with {status} while rendering frame {frame_index}.")]
    RendererExit {
        frame_index: usize,
        status: ExitStatus,
    },

    #[error("Renderer produced no image for frame {frame_index}.")]
    MissingImage { frame_index: usize },

    #[error("Could not read the rendered image of frame {frame_index}.")]
    ReadImage {
        frame_index: usize,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Could not prepare the merge working directory.")]
    WorkingDirectory(#[source] io::Error),

    #[error("Could not write frame {frame_index} into the merge working directory.")]
    MaterializeFrame {
        frame_index: usize,
        #[source]
        source: io::Error,
    },

    #[error("Failed while executing the encoder.")]
    Spawn(#[source] io::Error),

    #[error("Encoder process terminated with {0}.")]
    EncoderExit(ExitStatus),

    #[error("Could not read the encoded animation.")]
    ReadOutput(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage location: {0}")]
    InvalidLocation(String),

    #[error("Storage operation on {key:?} failed.")]
    ObjectStore {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Could not access local file {path:?}.")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures of the one-time "make this executable available" step,
/// kept apart from failures of individual tool invocations.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Could not find tool {name:?} (no staging source and not on PATH).")]
    NotFound { name: String },

    #[error("Staging source for tool {name:?} is not a file: {source_path:?}")]
    MissingSource { name: String, source_path: PathBuf },

    #[error("Could not stage tool {name:?} into {path:?}.")]
    Stage {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Tool {name:?} at {path:?} is not executable.")]
    NotExecutable { name: String, path: PathBuf },
}

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Cluster request failed: {0}")]
    Request(String),

    #[error("Unknown job step: {0}")]
    UnknownStep(String),

    #[error("Could not start packaged program {program:?}.")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything that can go wrong during one remote render, as seen by the caller.
///
/// A job that ends in any non-successful terminal state and a polling wait that
/// was interrupted or ran out of time are both reported as [`RenderJobError::JobFailed`].
#[derive(Error, Debug)]
pub enum RenderJobError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("Could not read scene file {path:?}.")]
    SceneFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error when communicating with remote storage.")]
    Storage(#[from] StorageError),

    #[error("Error when communicating with the cluster.")]
    Cluster(#[from] ClusterError),

    #[error("Job execution failed (step {step_id}).")]
    JobFailed { step_id: String },
}
