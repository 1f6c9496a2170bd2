use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use shared::errors::ClusterError;

pub mod local;

/// Status of a submitted job step, as reported by the cluster.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
    Interrupted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Failed => "FAILED",
            JobStatus::Interrupted => "INTERRUPTED",
        };

        f.write_str(name)
    }
}


/// One unit of work submitted to the cluster: the packaged program and its arguments.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct JobStep {
    pub name: String,

    pub program: String,

    pub arguments: Vec<String>,
}


/// The remote job API the driver talks to.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Submits `step` and returns its step id.
    async fn submit_step(&self, step: JobStep) -> Result<String, ClusterError>;

    async fn describe_step(&self, step_id: &str) -> Result<JobStatus, ClusterError>;

    /// Asks the cluster to stop a step. A stopped step reports [`JobStatus::Cancelled`].
    async fn cancel_step(&self, step_id: &str) -> Result<(), ClusterError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Interrupted.is_terminal());
    }

    #[test]
    fn status_names() {
        assert_eq!(JobStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(JobStatus::Interrupted.to_string(), "INTERRUPTED");
    }
}
