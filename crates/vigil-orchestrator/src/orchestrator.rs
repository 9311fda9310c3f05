//! The scheduling nucleus: job lifecycle plus the in-memory `active_jobs`
//! view that backstops the queue's TTL'd status map.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, warn};

use vigil_gpu::GpuRegistry;
use vigil_models::{CameraId, ChunkMetadata, GpuId, Job, JobId, JobStatus, JobStatusEntry, SourceType};

use crate::clock::Clock;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::queue_trait::JobQueue;
use crate::stats::QueueStats;

pub struct Orchestrator {
    pub(crate) queue: Arc<dyn JobQueue>,
    pub(crate) gpu_registry: Arc<GpuRegistry>,
    clock: Arc<dyn Clock>,
    pub(crate) config: OrchestratorConfig,
    active_jobs: RwLock<HashMap<JobId, Job>>,
    idempotency_index: RwLock<HashMap<String, (JobId, chrono::DateTime<chrono::Utc>)>>,
    cancel_signals: RwLock<HashMap<JobId, watch::Sender<bool>>>,
    reaper_tx: mpsc::UnboundedSender<JobId>,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        gpu_registry: Arc<GpuRegistry>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let (reaper_tx, reaper_rx) = mpsc::unbounded_channel();
        let this = Arc::new(Self {
            queue,
            gpu_registry,
            clock,
            config,
            active_jobs: RwLock::new(HashMap::new()),
            idempotency_index: RwLock::new(HashMap::new()),
            cancel_signals: RwLock::new(HashMap::new()),
            reaper_tx,
        });
        spawn_reaper(Arc::clone(&this), reaper_rx);
        spawn_stale_job_sweep(Arc::clone(&this));
        this
    }

    /// Force-fails any `assigned`/`processing` job whose `assigned_at` is
    /// older than `stale_job_deadline_secs` — catches workers that are
    /// still alive but have stopped making progress, which the reaper
    /// (exit/panic only) cannot see.
    pub(crate) async fn sweep_stale_jobs(&self) {
        let cutoff = self.clock.now() - ChronoDuration::seconds(self.config.stale_job_deadline_secs);
        let stale: Vec<JobId> = self
            .active_jobs
            .read()
            .await
            .values()
            .filter(|job| {
                matches!(job.status, JobStatus::Assigned | JobStatus::Processing)
                    && job.assigned_at.is_some_and(|at| at < cutoff)
            })
            .map(|job| job.id)
            .collect();

        for job_id in stale {
            warn!(job_id = %job_id, "job exceeded its assigned/processing deadline, force-failing");
            if let Err(e) = self.fail_job(job_id, "stale job deadline exceeded").await {
                warn!(job_id = %job_id, error = %e, "sweep_stale_jobs: fail_job failed");
            }
        }
    }

    pub(crate) fn reaper_handle(&self) -> mpsc::UnboundedSender<JobId> {
        self.reaper_tx.clone()
    }

    pub(crate) async fn job_snapshot(&self, job_id: JobId) -> Option<Job> {
        self.active_jobs.read().await.get(&job_id).cloned()
    }

    pub(crate) async fn register_cancel_signal(&self, job_id: JobId, sender: watch::Sender<bool>) {
        self.cancel_signals.write().await.insert(job_id, sender);
    }

    pub(crate) async fn clear_cancel_signal(&self, job_id: JobId) {
        self.cancel_signals.write().await.remove(&job_id);
    }

    /// Enqueues `camera_id`'s work as a new job and tracks it in
    /// `active_jobs` as `pending`. If `metadata` carries an
    /// `idempotency_key` already seen within the configured window, returns
    /// the existing job id without re-enqueueing.
    pub async fn create_job(
        &self,
        camera_id: CameraId,
        source_type: SourceType,
        source_path: impl Into<String>,
        metadata: serde_json::Value,
        priority: u32,
        chunk: Option<ChunkMetadata>,
    ) -> OrchestratorResult<JobId> {
        if let Some(key) = metadata.get("idempotency_key").and_then(|v| v.as_str()) {
            let mut index = self.idempotency_index.write().await;
            self.prune_idempotency_index(&mut index);
            if let Some((existing_id, _)) = index.get(key) {
                debug!(idempotency_key = key, job_id = %existing_id, "create_job deduplicated via idempotency key");
                return Ok(*existing_id);
            }
        }

        let mut job = Job::new(camera_id, source_type, source_path, priority);
        job.metadata = metadata;
        job.chunk = chunk;
        let job_id = job.id;

        self.queue.enqueue(&job).await?;
        self.queue
            .update_status(&JobStatusEntry::new(job_id.to_string(), JobStatus::Pending))
            .await?;

        if let Some(key) = job.idempotency_key().map(|s| s.to_string()) {
            self.idempotency_index.write().await.insert(key, (job_id, self.clock.now()));
        }

        self.active_jobs.write().await.insert(job_id, job);
        metrics::counter!("orchestrator_jobs_created").increment(1);
        Ok(job_id)
    }

    fn prune_idempotency_index(&self, index: &mut HashMap<String, (JobId, chrono::DateTime<chrono::Utc>)>) {
        let cutoff = self.clock.now() - ChronoDuration::seconds(self.config.idempotency_window_secs);
        index.retain(|_, (_, seen_at)| *seen_at >= cutoff);
    }

    /// Asks the GPU Registry for a slot with at least `min_free_gpu_bytes`
    /// free. On success, marks the slot busy and transitions the job to
    /// `assigned`. Returns `None` if no GPU is free.
    pub async fn assign_job_to_gpu(&self, job_id: JobId) -> OrchestratorResult<Option<GpuId>> {
        let Some(gpu_id) = self.gpu_registry.get_available(self.config.min_free_gpu_bytes).await else {
            return Ok(None);
        };
        self.gpu_registry.mark_busy(&gpu_id).await;

        let entry = {
            let mut jobs = self.active_jobs.write().await;
            let job = jobs.get_mut(&job_id).ok_or(OrchestratorError::JobNotFound(job_id))?;
            job.assign(gpu_id.clone());
            JobStatusEntry::new(job_id.to_string(), JobStatus::Assigned).with_gpu(gpu_id.to_string())
        };

        self.queue.update_status(&entry).await?;
        Ok(Some(gpu_id))
    }

    pub async fn start_processing(&self, job_id: JobId) -> OrchestratorResult<()> {
        {
            let mut jobs = self.active_jobs.write().await;
            let job = jobs.get_mut(&job_id).ok_or(OrchestratorError::JobNotFound(job_id))?;
            job.start_processing();
        }
        self.queue
            .update_status(&JobStatusEntry::new(job_id.to_string(), JobStatus::Processing))
            .await?;
        Ok(())
    }

    pub async fn complete_job(&self, job_id: JobId) -> OrchestratorResult<()> {
        let gpu_id = {
            let mut jobs = self.active_jobs.write().await;
            let job = jobs.get_mut(&job_id).ok_or(OrchestratorError::JobNotFound(job_id))?;
            let gpu_id = job.gpu_id.clone();
            job.complete();
            gpu_id
        };

        if let Some(gpu_id) = &gpu_id {
            self.gpu_registry.mark_available(gpu_id).await;
        }
        self.queue
            .update_status(&JobStatusEntry::new(job_id.to_string(), JobStatus::Completed))
            .await?;
        metrics::counter!("orchestrator_jobs_completed").increment(1);
        Ok(())
    }

    pub async fn fail_job(&self, job_id: JobId, error: impl Into<String>) -> OrchestratorResult<()> {
        let error = error.into();
        let gpu_id = {
            let mut jobs = self.active_jobs.write().await;
            let job = jobs.get_mut(&job_id).ok_or(OrchestratorError::JobNotFound(job_id))?;
            let gpu_id = job.gpu_id.clone();
            job.fail(error.clone());
            gpu_id
        };

        if let Some(gpu_id) = &gpu_id {
            self.gpu_registry.mark_available(gpu_id).await;
        }
        self.queue
            .update_status(&JobStatusEntry::new(job_id.to_string(), JobStatus::Failed).with_error(error))
            .await?;
        metrics::counter!("orchestrator_jobs_failed").increment(1);
        Ok(())
    }

    /// From `pending`, removes the job from the queue and marks it
    /// cancelled directly. From `assigned`/`processing`, signals the
    /// worker task cooperatively; the dispatcher's grace-period watcher is
    /// responsible for force-failing the job if the worker does not react.
    pub async fn cancel_job(&self, job_id: JobId) -> OrchestratorResult<()> {
        let status = {
            let jobs = self.active_jobs.read().await;
            jobs.get(&job_id).ok_or(OrchestratorError::JobNotFound(job_id))?.status
        };

        match status {
            JobStatus::Pending => {
                let pending_job = {
                    let mut jobs = self.active_jobs.write().await;
                    let job = jobs.get_mut(&job_id).ok_or(OrchestratorError::JobNotFound(job_id))?;
                    // The pending-set member was written at enqueue time with
                    // status = Pending; remove_pending's full-payload ZREM
                    // needs that exact serialization, so snapshot it before
                    // job.cancel() mutates status/completed_at in place.
                    let pending_job = job.clone();
                    job.cancel();
                    pending_job
                };
                self.queue.remove_pending(&pending_job).await?;
                self.queue
                    .update_status(&JobStatusEntry::new(job_id.to_string(), JobStatus::Cancelled))
                    .await?;
                metrics::counter!("orchestrator_jobs_cancelled").increment(1);
                Ok(())
            }
            JobStatus::Assigned | JobStatus::Processing => {
                if let Some(sender) = self.cancel_signals.read().await.get(&job_id) {
                    let _ = sender.send(true);
                } else {
                    warn!(job_id = %job_id, "cancel_job: no worker registered for assigned/processing job");
                }
                Ok(())
            }
            _ => Err(OrchestratorError::InvalidTransition(job_id, status)),
        }
    }

    /// Reads the in-memory view first; falls back to the queue's status
    /// map, which survives a coordinator restart within its TTL.
    pub async fn get_job_status(&self, job_id: JobId) -> OrchestratorResult<Option<JobStatusEntry>> {
        if let Some(job) = self.active_jobs.read().await.get(&job_id) {
            return Ok(Some(JobStatusEntry {
                job_id: job.id.to_string(),
                status: job.status,
                gpu_id: job.gpu_id.as_ref().map(|g| g.to_string()),
                error: job.error.clone(),
                updated_at: self.clock.now(),
            }));
        }
        self.queue.get_status(job_id).await
    }

    pub async fn get_queue_stats(&self) -> OrchestratorResult<QueueStats> {
        Ok(QueueStats {
            queue_length: self.queue.length().await?,
            active_jobs_count: self.active_jobs.read().await.len(),
            gpu_count: self.gpu_registry.slot_count().await,
            available_gpus: self.gpu_registry.available_count().await,
        })
    }
}

/// Consumes job ids left behind by worker tasks that exited without
/// calling `complete_job`/`fail_job` (panic, process kill). Only force-fails
/// jobs still in a non-terminal status, since the normal completion path
/// races this channel benignly.
fn spawn_reaper(orchestrator: Arc<Orchestrator>, mut rx: mpsc::UnboundedReceiver<JobId>) {
    tokio::spawn(async move {
        while let Some(job_id) = rx.recv().await {
            let still_active = orchestrator
                .active_jobs
                .read()
                .await
                .get(&job_id)
                .map(|j| !j.status.is_terminal())
                .unwrap_or(false);
            if still_active {
                warn!(job_id = %job_id, "worker task exited without reporting completion, force-failing job");
                let _ = orchestrator.fail_job(job_id, "worker task exited without completing (reaped)").await;
            }
        }
    });
}

/// Periodically force-fails jobs stuck in `assigned`/`processing` past
/// their deadline — a worker that is alive but silently wedged never hits
/// the exit/panic-driven reaper above.
fn spawn_stale_job_sweep(orchestrator: Arc<Orchestrator>) {
    let interval_secs = orchestrator.config.stale_job_sweep_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            orchestrator.sweep_stale_jobs().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::queue_trait::fake::InMemoryJobQueue;
    use vigil_gpu::GpuRegistry;

    fn test_orchestrator() -> Arc<Orchestrator> {
        Orchestrator::new(
            Arc::new(InMemoryJobQueue::default()),
            Arc::new(GpuRegistry::cpu_only()),
            Arc::new(FixedClock::new(chrono::Utc::now())),
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_job_tracks_it_as_pending() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();

        let status = orchestrator.get_job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn idempotency_key_dedupes_within_window() {
        let orchestrator = test_orchestrator();
        let metadata = serde_json::json!({ "idempotency_key": "upload-42" });

        let first = orchestrator
            .create_job(CameraId::new(), SourceType::File, "a.mp4", metadata.clone(), 0, None)
            .await
            .unwrap();
        let second = orchestrator
            .create_job(CameraId::new(), SourceType::File, "a.mp4", metadata, 0, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(orchestrator.get_queue_stats().await.unwrap().queue_length, 1);
    }

    #[tokio::test]
    async fn assign_job_to_gpu_returns_none_with_no_gpus() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();

        assert!(orchestrator.assign_job_to_gpu(job_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_job_releases_gpu_and_clears_gpu_id() {
        let probe_registry = Arc::new(GpuRegistry::new(Arc::new(vigil_gpu::NullProbe)));
        let orchestrator = Orchestrator::new(
            Arc::new(InMemoryJobQueue::default()),
            probe_registry,
            Arc::new(FixedClock::new(chrono::Utc::now())),
            OrchestratorConfig::default(),
        );

        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();

        // No GPUs discovered by NullProbe, so assignment legitimately fails;
        // exercise complete_job's no-gpu branch directly instead.
        orchestrator.start_processing_for_test(job_id).await;
        orchestrator.complete_job(job_id).await.unwrap();
        let status = orchestrator.get_job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert!(status.gpu_id.is_none());
    }

    #[tokio::test]
    async fn cancel_pending_job_removes_it_from_queue() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();

        orchestrator.cancel_job(job_id).await.unwrap();
        let status = orchestrator.get_job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Cancelled);
        assert_eq!(orchestrator.get_queue_stats().await.unwrap().queue_length, 0);
    }

    #[tokio::test]
    async fn cancel_on_terminal_job_is_rejected() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();
        orchestrator.cancel_job(job_id).await.unwrap();

        let err = orchestrator.cancel_job(job_id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition(_, JobStatus::Cancelled)));
    }

    #[tokio::test]
    async fn sweep_stale_jobs_fails_jobs_past_their_deadline() {
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
        let mut config = OrchestratorConfig::default();
        config.stale_job_deadline_secs = 60;
        let orchestrator = Orchestrator::new(
            Arc::new(InMemoryJobQueue::default()),
            Arc::new(GpuRegistry::cpu_only()),
            Arc::clone(&clock) as Arc<dyn Clock>,
            config,
        );

        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();
        orchestrator.start_processing_for_test(job_id).await;

        // Still fresh: the sweep leaves it alone.
        orchestrator.sweep_stale_jobs().await;
        let status = orchestrator.get_job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Processing);

        clock.advance(ChronoDuration::seconds(120));
        orchestrator.sweep_stale_jobs().await;
        let status = orchestrator.get_job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("stale job deadline exceeded"));
    }

    #[tokio::test]
    async fn sweep_stale_jobs_ignores_pending_jobs() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator
            .create_job(CameraId::new(), SourceType::File, "clip.mp4", serde_json::Value::Null, 0, None)
            .await
            .unwrap();

        orchestrator.sweep_stale_jobs().await;
        let status = orchestrator.get_job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Pending);
    }

    impl Orchestrator {
        /// Test-only shortcut: force a job straight to `processing` without
        /// going through GPU assignment, for exercising complete/fail paths
        /// in isolation.
        async fn start_processing_for_test(&self, job_id: JobId) {
            let mut jobs = self.active_jobs.write().await;
            let job = jobs.get_mut(&job_id).unwrap();
            job.status = JobStatus::Assigned;
            job.assigned_at = Some(self.clock.now());
            job.start_processing();
        }
    }
}
