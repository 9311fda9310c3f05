//! Job: the central scheduling entity.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{CameraId, GpuId, JobId};

/// What kind of source a job processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A live or on-demand stream (RTSP/HTTP), processed until cancelled.
    Stream,
    /// A bounded chunk of an uploaded file.
    File,
}

/// Job lifecycle status. Transitions are monotonic forward only:
/// `Pending -> Assigned -> Processing -> {Completed | Failed | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Assigned,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Assigned => "assigned",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Assigned) => true,
            (Assigned, Processing) => true,
            (Assigned, Cancelled) => true,
            (Processing, Completed | Failed | Cancelled) => true,
            (Pending, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata carried on chunk-derived jobs; links the job back to its source
/// upload and frame range.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ChunkMetadata {
    pub chunk_index: u32,
    pub start_frame: u64,
    pub end_frame: u64,
    pub original_file: String,
}

/// One unit of scheduled video work, owned by the Orchestrator from submit
/// until it reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub camera_id: CameraId,
    pub source_type: SourceType,
    pub source_path: String,
    /// Non-negative; higher sorts sooner out of the priority queue.
    pub priority: u32,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_id: Option<GpuId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkMetadata>,
    /// Opaque caller-supplied metadata, including an optional
    /// `idempotency_key` honored by `Orchestrator::create_job`.
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(
        camera_id: CameraId,
        source_type: SourceType,
        source_path: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            id: JobId::new(),
            camera_id,
            source_type,
            source_path: source_path.into(),
            priority,
            status: JobStatus::Pending,
            gpu_id: None,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
            chunk: None,
            metadata: serde_json::Value::Null,
            error: None,
        }
    }

    /// Idempotency key from metadata, if the caller supplied one.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.metadata.get("idempotency_key")?.as_str()
    }

    pub fn assign(&mut self, gpu_id: GpuId) {
        debug_assert!(self.status.can_transition_to(JobStatus::Assigned));
        self.status = JobStatus::Assigned;
        self.gpu_id = Some(gpu_id);
        self.assigned_at = Some(Utc::now());
    }

    pub fn start_processing(&mut self) {
        debug_assert!(self.status.can_transition_to(JobStatus::Processing));
        self.status = JobStatus::Processing;
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.gpu_id = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.gpu_id = None;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.gpu_id = None;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic_forward() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Assigned));
        assert!(JobStatus::Assigned.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn assigned_and_processing_jobs_hold_a_gpu() {
        let mut job = Job::new(CameraId::new(), SourceType::File, "clip.mp4", 0);
        job.assign(GpuId::new("gpu-0"));
        assert!(job.gpu_id.is_some());
        job.start_processing();
        assert!(job.gpu_id.is_some());
        job.complete();
        assert!(job.gpu_id.is_none());
    }
}
