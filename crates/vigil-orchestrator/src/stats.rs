//! Snapshot returned by `Orchestrator::get_queue_stats`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue_length: u64,
    pub active_jobs_count: usize,
    pub gpu_count: usize,
    pub available_gpus: usize,
}
