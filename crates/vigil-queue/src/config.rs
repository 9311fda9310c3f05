//! Queue configuration.

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Sorted-set key holding pending job envelopes.
    pub pending_key: String,
    /// Key prefix for per-job status entries (TTL'd).
    pub status_key_prefix: String,
    /// TTL applied to each status entry on write.
    pub status_ttl_secs: u64,
    /// How long `dequeue` blocks, polling, before giving up.
    pub dequeue_timeout_secs: u64,
}

pub const DEFAULT_STATUS_TTL_SECS: u64 = 86_400; // 24h

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            pending_key: "vigil:jobs:pending".to_string(),
            status_key_prefix: "vigil:jobs:status:".to_string(),
            status_ttl_secs: DEFAULT_STATUS_TTL_SECS,
            dequeue_timeout_secs: 5,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            pending_key: std::env::var("QUEUE_PENDING_KEY").unwrap_or_else(|_| "vigil:jobs:pending".to_string()),
            status_key_prefix: std::env::var("QUEUE_STATUS_PREFIX")
                .unwrap_or_else(|_| "vigil:jobs:status:".to_string()),
            status_ttl_secs: std::env::var("QUEUE_STATUS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STATUS_TTL_SECS),
            dequeue_timeout_secs: std::env::var("QUEUE_DEQUEUE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }

    pub fn status_key(&self, job_id: impl std::fmt::Display) -> String {
        format!("{}{}", self.status_key_prefix, job_id)
    }
}
