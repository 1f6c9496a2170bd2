use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shared::cancellation::CancellationToken;
use shared::errors::ClusterError;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterClient, JobStatus, JobStep};

struct LocalStep {
    status: JobStatus,

    cancellation: CancellationToken,
}


/// A cluster made of this machine: every step runs as a child process.
pub struct LocalCluster {
    /// Placed before the step's own arguments, e.g. `--config worker.toml`.
    program_prefix_arguments: Vec<String>,

    steps: Arc<Mutex<HashMap<String, LocalStep>>>,

    next_step_number: AtomicUsize,
}

impl LocalCluster {
    pub fn new(program_prefix_arguments: Vec<String>) -> Self {
        Self {
            program_prefix_arguments,
            steps: Arc::new(Mutex::new(HashMap::new())),
            next_step_number: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl ClusterClient for LocalCluster {
    async fn submit_step(&self, step: JobStep) -> Result<String, ClusterError> {
        let step_id = format!(
            "s-{:08}",
            self.next_step_number.fetch_add(1, Ordering::SeqCst)
        );

        let mut child = Command::new(&step.program)
            .args(&self.program_prefix_arguments)
            .args(&step.arguments)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClusterError::Spawn {
                program: PathBuf::from(&step.program),
                source,
            })?;

        info!(step_id = %step_id, name = %step.name, "Started local job step.");

        let cancellation = CancellationToken::new();
        self.steps.lock().await.insert(
            step_id.clone(),
            LocalStep {
                status: JobStatus::Running,
                cancellation: cancellation.clone(),
            },
        );

        let steps = self.steps.clone();
        let watched_step_id = step_id.clone();
        tokio::spawn(async move {
            let final_status = tokio::select! {
                exit = child.wait() => match exit {
                    Ok(status) if status.success() => JobStatus::Completed,
                    Ok(status) => {
                        warn!(step_id = %watched_step_id, %status, "Local job step failed.");
                        JobStatus::Failed
                    }
                    Err(error) => {
                        warn!(step_id = %watched_step_id, %error, "Could not wait for local job step.");
                        JobStatus::Interrupted
                    }
                },
                _ = cancellation.cancelled() => {
                    if let Err(error) = child.kill().await {
                        warn!(step_id = %watched_step_id, %error, "Could not kill cancelled job step.");
                    }
                    JobStatus::Cancelled
                }
            };

            debug!(step_id = %watched_step_id, status = %final_status, "Local job step finished.");
            if let Some(step) = steps.lock().await.get_mut(&watched_step_id) {
                step.status = final_status;
            }
        });

        Ok(step_id)
    }

    async fn describe_step(&self, step_id: &str) -> Result<JobStatus, ClusterError> {
        self.steps
            .lock()
            .await
            .get(step_id)
            .map(|step| step.status)
            .ok_or_else(|| ClusterError::UnknownStep(step_id.to_string()))
    }

    async fn cancel_step(&self, step_id: &str) -> Result<(), ClusterError> {
        let steps_locked = self.steps.lock().await;
        let step = steps_locked
            .get(step_id)
            .ok_or_else(|| ClusterError::UnknownStep(step_id.to_string()))?;

        step.cancellation.cancel();
        Ok(())
    }
}
