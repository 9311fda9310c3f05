//! Dispatch loop: dequeues jobs, assigns GPUs, and spawns worker tasks,
//! generalized over a pluggable `JobHandler` so this crate stays the
//! scheduling nucleus and never links media/inference code directly.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, error, info};

use vigil_models::{GpuId, Job, JobId};

use crate::orchestrator::Orchestrator;

/// Runs one job to terminal status. Implementations live outside this
/// crate (a binary wiring `vigil-media` + `vigil-inference` +
/// `vigil-events` together); the dispatcher only needs this contract.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, job: Job, gpu_id: Option<GpuId>, cancel: watch::Receiver<bool>) -> Result<(), String>;
}

pub struct Dispatcher<H: JobHandler> {
    orchestrator: Arc<Orchestrator>,
    handler: Arc<H>,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl<H: JobHandler + 'static> Dispatcher<H> {
    pub fn new(orchestrator: Arc<Orchestrator>, handler: Arc<H>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let max_concurrent_jobs = orchestrator.config.max_concurrent_jobs;
        Self {
            orchestrator,
            handler,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            shutdown,
        }
    }

    /// Clone to hand to another task that needs to trigger shutdown.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Runs until `shutdown_handle().send(true)` is called, then waits for
    /// in-flight worker tasks to drain.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("dispatcher shutdown signal received");
                        break;
                    }
                }
                result = self.orchestrator.queue.dequeue(self.orchestrator.config.dequeue_timeout_secs) => {
                    match result {
                        Ok(Some(job)) => self.dispatch_one(job).await,
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "dequeue failed");
                            tokio::time::sleep(Duration::from_millis(self.orchestrator.config.dispatch_backoff_ms)).await;
                        }
                    }
                }
            }
        }

        self.wait_for_in_flight().await;
        info!("dispatcher stopped");
    }

    async fn dispatch_one(&self, job: Job) {
        let job_id = job.id;

        match self.orchestrator.assign_job_to_gpu(job_id).await {
            Ok(Some(gpu_id)) => {
                if let Err(e) = self.orchestrator.start_processing(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job processing");
                    return;
                }
                self.spawn_worker(job_id, gpu_id).await;
            }
            Ok(None) => {
                debug!(job_id = %job_id, "no GPU free, re-enqueuing");
                if let Err(e) = self.orchestrator.queue.requeue(&job).await {
                    error!(job_id = %job_id, error = %e, "failed to requeue job awaiting a GPU");
                }
                tokio::time::sleep(Duration::from_millis(self.orchestrator.config.dispatch_backoff_ms)).await;
            }
            Err(e) => error!(job_id = %job_id, error = %e, "assign_job_to_gpu failed"),
        }
    }

    async fn spawn_worker(&self, job_id: JobId, gpu_id: GpuId) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let handler = Arc::clone(&self.handler);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        orchestrator.register_cancel_signal(job_id, cancel_tx).await;
        let grace = Duration::from_secs(orchestrator.config.cancellation_grace_secs);

        tokio::spawn(async move {
            let _permit = permit;
            let mut guard = JobGuard::new(job_id, orchestrator.reaper_handle());

            let Some(job) = orchestrator.job_snapshot(job_id).await else {
                error!(job_id = %job_id, "worker spawned for a job missing from active_jobs");
                return;
            };

            tokio::select! {
                outcome = handler.execute(job, Some(gpu_id), cancel_rx.clone()) => {
                    guard.disarm();
                    match outcome {
                        Ok(()) => {
                            if let Err(e) = orchestrator.complete_job(job_id).await {
                                error!(job_id = %job_id, error = %e, "complete_job failed");
                            }
                        }
                        Err(reason) => {
                            if let Err(e) = orchestrator.fail_job(job_id, reason).await {
                                error!(job_id = %job_id, error = %e, "fail_job failed");
                            }
                        }
                    }
                }
                _ = cancellation_timeout(cancel_rx.clone(), grace) => {
                    guard.disarm();
                    if let Err(e) = orchestrator.fail_job(job_id, "cancellation timeout").await {
                        error!(job_id = %job_id, error = %e, "fail_job failed after cancellation timeout");
                    }
                }
            }

            orchestrator.clear_cancel_signal(job_id).await;
        });
    }

    async fn wait_for_in_flight(&self) {
        let max = self.orchestrator.config.max_concurrent_jobs;
        loop {
            if self.semaphore.available_permits() == max {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Resolves only once a cancellation has been signalled AND `grace` has
/// elapsed since. If the channel closes without ever signalling
/// cancellation, this never resolves — the caller's `select!` is expected
/// to settle via the other branch instead.
fn cancellation_timeout(mut cancel_rx: watch::Receiver<bool>, grace: Duration) -> impl Future<Output = ()> {
    async move {
        if !*cancel_rx.borrow() && cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    }
}

/// Guards a spawned worker task so exactly one of `complete_job`/`fail_job`
/// is eventually recorded even if the task panics: an armed guard sends its
/// job id to the orchestrator's reaper on drop, which force-fails the job
/// if it is still non-terminal.
struct JobGuard {
    job_id: JobId,
    armed: bool,
    reaper: mpsc::UnboundedSender<JobId>,
}

impl JobGuard {
    fn new(job_id: JobId, reaper: mpsc::UnboundedSender<JobId>) -> Self {
        Self { job_id, armed: true, reaper }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.reaper.send(self.job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn cancellation_timeout_never_fires_without_a_signal() {
        let (_tx, rx) = watch::channel(false);
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);

        tokio::spawn(async move {
            cancellation_timeout(rx, Duration::from_secs(1)).await;
            fired_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_timeout_fires_grace_after_signal() {
        let (tx, rx) = watch::channel(false);
        let start = Instant::now();

        let handle = tokio::spawn(cancellation_timeout(rx, Duration::from_secs(5)));
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn armed_guard_notifies_reaper_on_drop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job_id = JobId::new();
        {
            let _guard = JobGuard::new(job_id, tx);
        }
        assert_eq!(rx.recv().await, Some(job_id));
    }

    #[tokio::test]
    async fn disarmed_guard_notifies_nobody() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job_id = JobId::new();
        {
            let mut guard = JobGuard::new(job_id, tx);
            guard.disarm();
        }
        assert!(rx.try_recv().is_err());
    }
}
