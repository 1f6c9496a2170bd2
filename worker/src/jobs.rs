use std::collections::BTreeMap;
use std::path::Path;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use miette::{miette, Context, IntoDiagnostic, Result};
use shared::frames::{ChunkDescriptor, FrameRecord, ANIMATION_GROUP_KEY};
use shared::storage::{
    chunk_descriptor_ordinal,
    ObjectStoreClient,
    StorageClient,
    RESULT_OBJECT_NAME,
    SCENE_OBJECT_NAME,
};
use tracing::{debug, info};

use crate::merging::FrameMerger;
use crate::rendering::runner::FrameRenderer;
use crate::rendering::task::WorkerTask;

/// The three locations the packaged program receives from the cluster.
#[derive(Clone, Debug)]
pub struct AnimationJob {
    pub input_location: String,

    pub output_location: String,

    pub scene_location: String,
}


/// Runs one animation job: render every chunk, combine each chunk's frames,
/// then reduce all combined results per group into the result object.
pub struct AnimationJobRunner {
    renderer: FrameRenderer,

    merger: FrameMerger,

    chunk_parallelism: usize,
}

impl AnimationJobRunner {
    pub fn new(renderer: FrameRenderer, merger: FrameMerger, chunk_parallelism: usize) -> Self {
        Self {
            renderer,
            merger,
            chunk_parallelism: chunk_parallelism.max(1),
        }
    }

    pub async fn run(&self, job: &AnimationJob) -> Result<()> {
        let input_storage = ObjectStoreClient::from_url(&job.input_location)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Could not open input location."))?;
        let output_storage = ObjectStoreClient::from_url(&job.output_location)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Could not open output location."))?;

        let chunks = read_chunk_descriptors(&input_storage).await?;
        if chunks.is_empty() {
            return Err(miette!(
                "No chunk descriptors found at {}.",
                job.input_location
            ));
        }
        info!(chunks = chunks.len(), "Loaded chunk descriptors.");

        let scene_directory = tempfile::Builder::new()
            .prefix("scene-")
            .tempdir()
            .into_diagnostic()
            .wrap_err_with(|| miette!("Could not create scene directory."))?;
        let scene_file_path = scene_directory.path().join(SCENE_OBJECT_NAME);
        download_scene(&job.scene_location, &scene_file_path).await?;

        let combined = self.render_and_combine(&scene_file_path, chunks).await?;
        let results = self.reduce(combined).await?;

        if results.is_empty() {
            return Err(miette!("No frames were rendered, nothing to write."));
        }

        for (group_key, animation) in results {
            let result_key = result_object_key(group_key);
            info!(group_key, key = %result_key, "Writing merged animation.");

            output_storage
                .put(&result_key, animation.image)
                .await
                .into_diagnostic()
                .wrap_err_with(|| miette!("Could not write the merged animation."))?;
        }

        Ok(())
    }

    /// Renders the chunks (up to `chunk_parallelism` at a time) and merges each
    /// chunk's frames right away. Results stay in chunk order.
    pub async fn render_and_combine(
        &self,
        scene_file_path: &Path,
        chunks: Vec<(u32, ChunkDescriptor)>,
    ) -> Result<Vec<FrameRecord>> {
        let tasks = chunks.into_iter().map(|(group_key, chunk)| async move {
            let task = WorkerTask::new(&self.renderer, scene_file_path, group_key);

            let frames = task
                .render(&chunk)
                .await
                .into_diagnostic()
                .wrap_err_with(|| miette!("Worker task for chunk {} failed.", chunk))?;

            self.merger
                .merge(group_key, frames)
                .await
                .into_diagnostic()
                .wrap_err_with(|| miette!("Combining chunk {} failed.", chunk))
        });

        let combined: Vec<Option<FrameRecord>> = stream::iter(tasks)
            .buffered(self.chunk_parallelism)
            .try_collect()
            .await?;

        Ok(combined.into_iter().flatten().collect())
    }

    /// Groups records by key (keeping their order) and merges each group once more.
    pub async fn reduce(&self, records: Vec<FrameRecord>) -> Result<BTreeMap<u32, FrameRecord>> {
        let mut groups: BTreeMap<u32, Vec<FrameRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.group_key).or_default().push(record);
        }

        let mut results = BTreeMap::new();
        for (group_key, group) in groups {
            debug!(group_key, records = group.len(), "Reducing group.");

            let merged = self
                .merger
                .merge(group_key, group)
                .await
                .into_diagnostic()
                .wrap_err_with(|| miette!("Reducing group {} failed.", group_key))?;

            if let Some(merged) = merged {
                results.insert(group_key, merged);
            }
        }

        Ok(results)
    }
}


/// Reads every `file<n>` descriptor object below the storage root, in ordinal order.
///
/// Each non-empty line of a descriptor object is one chunk.
pub async fn read_chunk_descriptors(
    storage: &dyn StorageClient,
) -> Result<Vec<(u32, ChunkDescriptor)>> {
    let mut keys: Vec<(usize, String)> = storage
        .list("")
        .await
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not list chunk descriptors."))?
        .into_iter()
        .filter_map(|key| chunk_descriptor_ordinal(&key).map(|ordinal| (ordinal, key)))
        .collect();
    keys.sort();

    let mut chunks = Vec::with_capacity(keys.len());
    for (_, key) in keys {
        let contents = storage
            .get(&key)
            .await
            .into_diagnostic()
            .wrap_err_with(|| miette!("Could not read chunk descriptor {}.", key))?;

        let contents = String::from_utf8(contents)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Chunk descriptor {} is not UTF-8.", key))?;

        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            let chunk = ChunkDescriptor::from_line(line)
                .into_diagnostic()
                .wrap_err_with(|| miette!("Invalid chunk descriptor {}.", key))?;

            chunks.push(chunk);
        }
    }

    Ok(chunks)
}

async fn download_scene(scene_location: &str, local_path: &Path) -> Result<()> {
    // The client's root is the scene object itself.
    let scene_storage = ObjectStoreClient::from_url(scene_location)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not open scene location."))?;

    scene_storage
        .download_to_file("", local_path)
        .await
        .into_diagnostic()
        .wrap_err_with(|| miette!("Could not download scene from {}.", scene_location))
}

fn result_object_key(group_key: u32) -> String {
    if group_key == ANIMATION_GROUP_KEY {
        RESULT_OBJECT_NAME.to_string()
    } else {
        format!("{RESULT_OBJECT_NAME}-{group_key}")
    }
}
