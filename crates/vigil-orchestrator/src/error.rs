//! Orchestrator error types.

use thiserror::Error;
use vigil_models::{JobId, JobStatus};

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("queue error: {0}")]
    Queue(#[from] vigil_queue::QueueError),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job {0} cannot be operated on from status {1}")]
    InvalidTransition(JobId, JobStatus),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
