//! Thin trait over the priority queue backend so the Orchestrator's
//! lifecycle logic can be unit-tested without a live Redis server, while
//! the real dispatcher runs against `vigil_queue::PriorityQueue` unchanged.

use async_trait::async_trait;
use vigil_models::{Job, JobId, JobStatusEntry};

use crate::error::OrchestratorResult;

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &Job) -> OrchestratorResult<JobId>;
    async fn dequeue(&self, timeout_secs: u64) -> OrchestratorResult<Option<Job>>;
    async fn requeue(&self, job: &Job) -> OrchestratorResult<()>;
    async fn get_status(&self, job_id: JobId) -> OrchestratorResult<Option<JobStatusEntry>>;
    async fn update_status(&self, entry: &JobStatusEntry) -> OrchestratorResult<()>;
    async fn length(&self) -> OrchestratorResult<u64>;
    async fn remove_pending(&self, job: &Job) -> OrchestratorResult<bool>;
}

#[async_trait]
impl JobQueue for vigil_queue::PriorityQueue {
    async fn enqueue(&self, job: &Job) -> OrchestratorResult<JobId> {
        Ok(vigil_queue::PriorityQueue::enqueue(self, job).await?)
    }

    async fn dequeue(&self, timeout_secs: u64) -> OrchestratorResult<Option<Job>> {
        Ok(vigil_queue::PriorityQueue::dequeue(self, timeout_secs).await?)
    }

    async fn requeue(&self, job: &Job) -> OrchestratorResult<()> {
        Ok(vigil_queue::PriorityQueue::requeue(self, job).await?)
    }

    async fn get_status(&self, job_id: JobId) -> OrchestratorResult<Option<JobStatusEntry>> {
        Ok(vigil_queue::PriorityQueue::get_status(self, job_id).await?)
    }

    async fn update_status(&self, entry: &JobStatusEntry) -> OrchestratorResult<()> {
        Ok(vigil_queue::PriorityQueue::update_status(self, entry).await?)
    }

    async fn length(&self) -> OrchestratorResult<u64> {
        Ok(vigil_queue::PriorityQueue::length(self).await?)
    }

    async fn remove_pending(&self, job: &Job) -> OrchestratorResult<bool> {
        Ok(vigil_queue::PriorityQueue::remove_pending(self, job).await?)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    /// In-process stand-in for `PriorityQueue`, ordered the same way
    /// (score = priority, then earliest submission first).
    #[derive(Default)]
    pub(crate) struct InMemoryJobQueue {
        pending: Mutex<BTreeMap<(std::cmp::Reverse<u32>, i64), Job>>,
        statuses: Mutex<std::collections::HashMap<String, JobStatusEntry>>,
    }

    #[async_trait]
    impl JobQueue for InMemoryJobQueue {
        async fn enqueue(&self, job: &Job) -> OrchestratorResult<JobId> {
            let key = (std::cmp::Reverse(job.priority), job.created_at.timestamp_millis());
            self.pending.lock().unwrap().insert(key, job.clone());
            Ok(job.id)
        }

        async fn dequeue(&self, _timeout_secs: u64) -> OrchestratorResult<Option<Job>> {
            let mut pending = self.pending.lock().unwrap();
            let key = pending.keys().next().cloned();
            Ok(key.and_then(|k| pending.remove(&k)))
        }

        async fn requeue(&self, job: &Job) -> OrchestratorResult<()> {
            self.enqueue(job).await.map(|_| ())
        }

        async fn get_status(&self, job_id: JobId) -> OrchestratorResult<Option<JobStatusEntry>> {
            Ok(self.statuses.lock().unwrap().get(&job_id.to_string()).cloned())
        }

        async fn update_status(&self, entry: &JobStatusEntry) -> OrchestratorResult<()> {
            self.statuses.lock().unwrap().insert(entry.job_id.clone(), entry.clone());
            Ok(())
        }

        async fn length(&self) -> OrchestratorResult<u64> {
            Ok(self.pending.lock().unwrap().len() as u64)
        }

        /// Matches by full serialized payload, same as the real queue's
        /// Redis `ZREM`, so a caller that mutates `job` before removing it
        /// (and thereby drifts the payload from what was enqueued) fails
        /// here exactly as it would against Redis.
        async fn remove_pending(&self, job: &Job) -> OrchestratorResult<bool> {
            let payload = serde_json::to_string(job).expect("Job serializes");
            let mut pending = self.pending.lock().unwrap();
            let matching_key = pending
                .iter()
                .find(|(_, v)| serde_json::to_string(v).expect("Job serializes") == payload)
                .map(|(k, _)| *k);
            Ok(matching_key.map(|k| pending.remove(&k)).is_some())
        }
    }
}
