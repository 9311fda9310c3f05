//! Orchestrator configuration.

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum free GPU memory `assignJobToGPU` requires, in bytes.
    pub min_free_gpu_bytes: u64,
    /// Backoff between dispatcher ticks when no GPU is free or dequeue fails.
    pub dispatch_backoff_ms: u64,
    /// How long `dequeue` blocks per dispatcher tick before retrying.
    pub dequeue_timeout_secs: u64,
    /// Grace period after a cancellation signal before a worker is
    /// force-failed with "cancellation timeout".
    pub cancellation_grace_secs: u64,
    /// Upper bound on concurrently-running worker tasks.
    pub max_concurrent_jobs: usize,
    /// How long an idempotency key is honored after `create_job`.
    pub idempotency_window_secs: i64,
    /// How long a job may sit in `assigned`/`processing` since its
    /// `assigned_at` before the stale-job sweep force-fails it.
    pub stale_job_deadline_secs: i64,
    /// How often the stale-job sweep scans `active_jobs`.
    pub stale_job_sweep_interval_secs: u64,
}

const DEFAULT_MIN_FREE_GPU_GB: u64 = 2;
const DEFAULT_DISPATCH_BACKOFF_MS: u64 = 200;
const DEFAULT_DEQUEUE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CANCELLATION_GRACE_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 8;
const DEFAULT_IDEMPOTENCY_WINDOW_SECS: i64 = 86_400;
const DEFAULT_STALE_JOB_DEADLINE_SECS: i64 = 1_800;
const DEFAULT_STALE_JOB_SWEEP_INTERVAL_SECS: u64 = 60;

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_free_gpu_bytes: DEFAULT_MIN_FREE_GPU_GB * 1024 * 1024 * 1024,
            dispatch_backoff_ms: DEFAULT_DISPATCH_BACKOFF_MS,
            dequeue_timeout_secs: DEFAULT_DEQUEUE_TIMEOUT_SECS,
            cancellation_grace_secs: DEFAULT_CANCELLATION_GRACE_SECS,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            idempotency_window_secs: DEFAULT_IDEMPOTENCY_WINDOW_SECS,
            stale_job_deadline_secs: DEFAULT_STALE_JOB_DEADLINE_SECS,
            stale_job_sweep_interval_secs: DEFAULT_STALE_JOB_SWEEP_INTERVAL_SECS,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            min_free_gpu_bytes: std::env::var("GPU_MIN_FREE_GB")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|gb| gb * 1024 * 1024 * 1024)
                .unwrap_or(default.min_free_gpu_bytes),
            dispatch_backoff_ms: std::env::var("DISPATCH_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.dispatch_backoff_ms),
            dequeue_timeout_secs: std::env::var("QUEUE_DEQUEUE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.dequeue_timeout_secs),
            cancellation_grace_secs: std::env::var("CANCELLATION_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cancellation_grace_secs),
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_concurrent_jobs),
            idempotency_window_secs: default.idempotency_window_secs,
            stale_job_deadline_secs: std::env::var("STALE_JOB_DEADLINE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.stale_job_deadline_secs),
            stale_job_sweep_interval_secs: std::env::var("STALE_JOB_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.stale_job_sweep_interval_secs),
        }
    }
}
