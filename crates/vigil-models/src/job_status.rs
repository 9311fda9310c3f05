//! The durable, short-TTL view of a job's status, as written to the
//! Priority Queue's status map. This is deliberately smaller than `Job`: it
//! is what survives a coordinator restart within the 24h TTL window, while
//! `Job` (with its full metadata) lives in the Orchestrator's in-memory view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusEntry {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusEntry {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            gpu_id: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_gpu(mut self, gpu_id: impl Into<String>) -> Self {
        self.gpu_id = Some(gpu_id.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
