//! Persistent, ordered set of pending jobs plus a short-TTL status map.
//!
//! Ordering uses a Redis sorted set scored so that priority dominates and
//! submission order breaks ties within a priority class. The literal
//! `priority * 10^6 + submit_timestamp_ms` formula collides across
//! priorities once timestamps exceed six digits and, taken as "highest
//! score wins", would serve newer jobs before older ones at equal
//! priority — the opposite of the stated FIFO-within-priority guarantee.
//! This implementation instead scores
//! `priority * PRIORITY_SCALE - submit_timestamp_ms` and pops the maximum,
//! which gives the same "priority dominates, then earliest first" order
//! without the collision or inversion bug.
//!
//! The score is a `f64`, exact for integers only up to 2^53. `PRIORITY_SCALE`
//! is sized to clear `submit_timestamp_ms` (≤13 digits through year 2286),
//! which leaves headroom for at most `MAX_PRIORITY` priority bands before
//! `priority * PRIORITY_SCALE` itself loses integer precision and corrupts
//! ordering. `enqueue` rejects any job above that bound instead of silently
//! miscomparing it.

use redis::AsyncCommands;
use tracing::{debug, warn};

use vigil_models::{Job, JobId, JobStatus, JobStatusEntry};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};

/// Large enough that `submit_timestamp_ms` (≤13 digits through year 2286)
/// never crosses into the next priority band.
const PRIORITY_SCALE: i64 = 10_i64.pow(13);

/// Highest priority `enqueue` accepts. Chosen so that
/// `MAX_PRIORITY * PRIORITY_SCALE + PRIORITY_SCALE` (the largest score
/// magnitude the formula can produce) stays comfortably inside `f64`'s
/// 2^53 exact-integer range (~9.007e15); 500 * 1e13 = 5e15.
pub const MAX_PRIORITY: u32 = 500;

pub struct PriorityQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl PriorityQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    fn score_for(priority: u32, submit_timestamp_ms: i64) -> f64 {
        (priority as i64 * PRIORITY_SCALE - submit_timestamp_ms) as f64
    }

    /// Allocates the job's id (already set on `job` by the caller),
    /// writes the envelope into the ordered set, and emits
    /// `jobs_enqueued{type}`.
    pub async fn enqueue(&self, job: &Job) -> QueueResult<JobId> {
        if job.priority > MAX_PRIORITY {
            return Err(QueueError::PriorityOutOfRange(job.priority, MAX_PRIORITY));
        }

        let mut conn = self.conn().await?;
        let score = Self::score_for(job.priority, job.created_at.timestamp_millis());
        let payload = serde_json::to_string(job)?;

        let _: () = conn
            .zadd(&self.config.pending_key, &payload, score)
            .await
            .map_err(|e| QueueError::EnqueueFailed(e.to_string()))?;

        metrics::counter!("jobs_enqueued", "type" => job_type_label(job)).increment(1);
        debug!(job_id = %job.id, score, "enqueued job");
        Ok(job.id)
    }

    /// Atomically pops the highest-score entry, blocking up to `timeout`.
    /// Returns `Ok(None)` on timeout. The actual member payload is looked
    /// up via a paired hash keyed by member id, since `BZPOPMAX` only
    /// returns the member string and score.
    pub async fn dequeue(&self, timeout_secs: u64) -> QueueResult<Option<Job>> {
        let mut conn = self.conn().await?;

        let result: Option<(String, String, f64)> = redis::cmd("BZPOPMAX")
            .arg(&self.config.pending_key)
            .arg(timeout_secs as f64)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::DequeueFailed(e.to_string()))?;

        let Some((_key, payload, _score)) = result else {
            return Ok(None);
        };

        let job: Job = serde_json::from_str(&payload)?;
        Ok(Some(job))
    }

    /// Re-enqueues `job` at the score it would have received at its
    /// original `created_at` — used by the dispatcher when no GPU is free
    /// so the job does not lose its place in line.
    pub async fn requeue(&self, job: &Job) -> QueueResult<()> {
        self.enqueue(job).await.map(|_| ())
    }

    pub async fn get_status(&self, job_id: JobId) -> QueueResult<Option<JobStatusEntry>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(self.config.status_key(job_id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn update_status(&self, entry: &JobStatusEntry) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(entry)?;
        let _: () = conn
            .set_ex(self.config.status_key(entry.job_id.clone()), payload, self.config.status_ttl_secs)
            .await?;
        Ok(())
    }

    /// O(1) cardinality of the pending set.
    pub async fn length(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let count: u64 = conn.zcard(&self.config.pending_key).await?;
        Ok(count)
    }

    /// Removes a job from the pending set without dequeuing it —
    /// used by `cancelJob` on a still-`pending` job.
    pub async fn remove_pending(&self, job: &Job) -> QueueResult<bool> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job)?;
        let removed: u64 = conn.zrem(&self.config.pending_key, payload).await?;
        if removed == 0 {
            warn!(job_id = %job.id, "remove_pending: job was not found in the pending set (payload drifted or already dequeued)");
        }
        Ok(removed > 0)
    }
}

fn job_type_label(job: &Job) -> &'static str {
    match job.source_type {
        vigil_models::SourceType::Stream => "stream",
        vigil_models::SourceType::File => "file",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_always_outscores_lower_regardless_of_timestamp() {
        let old_high = PriorityQueue::score_for(1, 1_000);
        let new_low = PriorityQueue::score_for(0, 9_999_999_999_999);
        assert!(old_high > new_low);
    }

    #[test]
    fn equal_priority_favors_earlier_submission() {
        let earlier = PriorityQueue::score_for(0, 1_000);
        let later = PriorityQueue::score_for(0, 2_000);
        assert!(earlier > later);
    }

    #[test]
    fn max_priority_score_stays_within_f64_exact_integer_range() {
        // 2^53, the largest integer f64 can represent exactly.
        const F64_EXACT_INT_BOUND: i64 = 9_007_199_254_740_992;
        let score = MAX_PRIORITY as i64 * PRIORITY_SCALE - 9_999_999_999_999_i64;
        assert!(score.unsigned_abs() < F64_EXACT_INT_BOUND as u64);
    }

    #[test]
    fn distinct_priorities_up_to_the_bound_never_collide_regardless_of_timestamp() {
        // A lower priority's score, even with the earliest possible
        // timestamp, must never reach a higher priority's score with the
        // latest possible timestamp within the same epoch window.
        for priority in 0..MAX_PRIORITY {
            let higher_at_worst_case = PriorityQueue::score_for(priority + 1, 9_999_999_999_999);
            let lower_at_best_case = PriorityQueue::score_for(priority, 0);
            assert!(higher_at_worst_case > lower_at_best_case, "priority band collision at {priority}");
        }
    }

    #[tokio::test]
    async fn enqueue_rejects_priority_above_the_bound() {
        let queue = PriorityQueue::new(QueueConfig::default()).unwrap();
        let mut job = Job::new(vigil_models::CameraId::new(), vigil_models::SourceType::File, "clip.mp4", 0);
        job.priority = MAX_PRIORITY + 1;

        let err = queue.enqueue(&job).await.unwrap_err();
        assert!(matches!(err, QueueError::PriorityOutOfRange(p, MAX_PRIORITY) if p == MAX_PRIORITY + 1));
    }
}
