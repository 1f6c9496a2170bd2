use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::cancellation::CancellationToken;
use shared::errors::RenderJobError;
use shared::frames::ANIMATION_GROUP_KEY;
use shared::jobs::RenderRequest;
use shared::storage::{StorageClient, StorageNamespace};
use tracing::{debug, info, warn};

use crate::cluster::{ClusterClient, JobStatus, JobStep};
use crate::progress::ProgressNotifier;

const CLEANING_UP_MESSAGE: &str = "cleaning up remote storage";
const PREPARING_INPUT_MESSAGE: &str = "preparing required input files";
const STARTING_JOB_MESSAGE: &str = "starting rendering job";
const WAITING_MESSAGE: &str = "waiting for completion of rendering job";
const DOWNLOADING_MESSAGE: &str = "downloading generated animation";
const COMPLETE_MESSAGE: &str = "rendering complete";
const FAILED_MESSAGE: &str = "rendering failed";

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum DriverState {
    NotStarted,
    Submitting,
    Polling { step_id: String },
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct PollingSettings {
    pub check_interval: Duration,

    /// `None` waits for as long as the job takes.
    pub max_wait: Option<Duration>,
}


/// Drives one render through the remote cluster:
/// clean storage, upload work, submit, poll, download.
pub struct JobDriver {
    storage: Arc<dyn StorageClient>,

    cluster: Arc<dyn ClusterClient>,

    namespace: StorageNamespace,

    /// Program every job step runs, as the cluster understands it.
    program_location: String,

    polling: PollingSettings,

    progress: ProgressNotifier,

    cancellation: CancellationToken,

    state: DriverState,
}

impl JobDriver {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        cluster: Arc<dyn ClusterClient>,
        namespace: StorageNamespace,
        program_location: String,
        polling: PollingSettings,
    ) -> Self {
        Self {
            storage,
            cluster,
            namespace,
            program_location,
            polling,
            progress: ProgressNotifier::new(),
            cancellation: CancellationToken::new(),
            state: DriverState::NotStarted,
        }
    }

    pub fn progress(&self) -> &ProgressNotifier {
        &self.progress
    }

    /// Cancelling this token interrupts the polling wait, which fails the render.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Renders `request` remotely and writes the merged animation to `output_file_path`.
    ///
    /// The request is validated and the scene read before any remote call is made.
    pub async fn render(
        &mut self,
        request: &RenderRequest,
        output_file_path: &Path,
    ) -> Result<(), RenderJobError> {
        let result = self.run_render(request, output_file_path).await;

        if let Err(error) = &result {
            warn!(%error, state = ?self.state, "Render failed.");
            self.state = DriverState::Failed;
            self.progress.notify(FAILED_MESSAGE);
        }

        result
    }

    async fn run_render(
        &mut self,
        request: &RenderRequest,
        output_file_path: &Path,
    ) -> Result<(), RenderJobError> {
        let chunks = request.chunks()?;
        let scene = tokio::fs::read(request.scene_file())
            .await
            .map_err(|source| RenderJobError::SceneFile {
                path: request.scene_file().to_path_buf(),
                source,
            })?;

        self.state = DriverState::Submitting;

        self.progress.notify(CLEANING_UP_MESSAGE);
        self.storage
            .clear_prefix(self.namespace.input_prefix())
            .await?;
        self.storage
            .clear_prefix(self.namespace.output_prefix())
            .await?;

        self.progress.notify(PREPARING_INPUT_MESSAGE);
        for (ordinal, chunk) in chunks.iter().enumerate() {
            debug!(ordinal, %chunk, "Uploading chunk descriptor.");

            self.storage
                .put(
                    &self.namespace.chunk_descriptor_key(ordinal),
                    format!("{}\n", chunk.to_line(ANIMATION_GROUP_KEY)).into_bytes(),
                )
                .await?;
        }
        self.storage.put(&self.namespace.scene_key(), scene).await?;

        self.progress.notify(STARTING_JOB_MESSAGE);
        let step = JobStep {
            name: request.step_name(),
            program: self.program_location.clone(),
            arguments: vec![
                self.namespace.input_url(),
                self.namespace.output_url(),
                self.namespace.scene_url(),
            ],
        };
        let step_id = self.cluster.submit_step(step).await?;
        info!(step_id = %step_id, chunks = chunks.len(), "Submitted render job.");

        self.state = DriverState::Polling {
            step_id: step_id.clone(),
        };
        self.progress.notify(WAITING_MESSAGE);

        let final_status = self.wait_for_completion(&step_id).await?;
        if final_status != JobStatus::Completed {
            warn!(step_id = %step_id, status = %final_status, "Render job did not complete.");
            return Err(RenderJobError::JobFailed { step_id });
        }

        self.progress.notify(DOWNLOADING_MESSAGE);
        self.storage
            .download_to_file(&self.namespace.result_key(), output_file_path)
            .await?;

        self.state = DriverState::Succeeded;
        self.progress.notify(COMPLETE_MESSAGE);

        Ok(())
    }

    /// Checks the step's status every `check_interval` until it reaches a terminal state.
    async fn wait_for_completion(&self, step_id: &str) -> Result<JobStatus, RenderJobError> {
        let polling_start = Instant::now();

        loop {
            let status = self.cluster.describe_step(step_id).await?;
            debug!(step_id, %status, "Polled render job.");

            if status.is_terminal() {
                return Ok(status);
            }

            if let Some(max_wait) = self.polling.max_wait {
                if polling_start.elapsed() >= max_wait {
                    warn!(step_id, "Render job exceeded the maximum wait, giving up.");
                    return Err(self.abandon_step(step_id).await);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.polling.check_interval) => {},
                _ = self.cancellation.cancelled() => {
                    warn!(step_id, "Waiting for render job was interrupted.");
                    return Err(self.abandon_step(step_id).await);
                }
            }
        }
    }

    async fn abandon_step(&self, step_id: &str) -> RenderJobError {
        if let Err(error) = self.cluster.cancel_step(step_id).await {
            warn!(step_id, %error, "Could not cancel abandoned render job.");
        }

        RenderJobError::JobFailed {
            step_id: step_id.to_string(),
        }
    }
}
