//! Wires frame decode, sampling, detection, tracking, and rule evaluation
//! into one `JobHandler` — the worker's end of the dispatch loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use vigil_events::{alert_channel, attach_clip, dispatch_alerts, AlertSender, EventEmitter, FrameObservation};
use vigil_inference::{DetectionEngine, Device, FrameProcessor, FrameProcessorConfig, ObjectTracker, OnnxDetectionEngine};
use vigil_models::{CameraZone, GpuId, Job};
use vigil_orchestrator::JobHandler;
use vigil_repo::{AlertRepository, CameraRepository, EventRepository, RuleRepository};

use crate::config::WorkerConfig;
use crate::decoder::RawFrameDecoder;
use crate::error::WorkerError;

/// Runs fired events' alerts out of the channel `PipelineHandler` feeds,
/// persisting each before it leaves the process — the "notification
/// dispatcher (out of scope)" that `vigil_events::alert_sink` hands off to.
pub fn spawn_alert_sink(alerts: Arc<dyn AlertRepository>, mut receiver: vigil_events::AlertReceiver) {
    tokio::spawn(async move {
        while let Some(alert) = receiver.recv().await {
            if let Err(e) = alerts.insert(alert).await {
                warn!(error = %e, "failed to persist alert");
            }
        }
    });
}

/// Implements `JobHandler::execute` by running the full per-job pipeline:
/// probe the source, decode raw frames, sample, detect, track, evaluate
/// rules, mint events, attach clips, and fan out alerts.
pub struct PipelineHandler {
    config: WorkerConfig,
    cameras: Arc<dyn CameraRepository>,
    rules: Arc<dyn RuleRepository>,
    events: Arc<dyn EventRepository>,
    alert_sender: AlertSender,
    engines: RwLock<HashMap<String, Arc<OnnxDetectionEngine>>>,
}

impl PipelineHandler {
    pub fn new(
        config: WorkerConfig,
        cameras: Arc<dyn CameraRepository>,
        rules: Arc<dyn RuleRepository>,
        events: Arc<dyn EventRepository>,
        alerts: Arc<dyn AlertRepository>,
    ) -> Self {
        let (alert_sender, alert_receiver) = alert_channel();
        spawn_alert_sink(alerts, alert_receiver);
        Self {
            config,
            cameras,
            rules,
            events,
            alert_sender,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Execution provider follows the GPU the Orchestrator assigned at
    /// dispatch time, not a probe the engine runs itself.
    fn device_for(gpu_id: &Option<GpuId>) -> Device {
        gpu_id
            .as_ref()
            .and_then(|id| id.as_str().strip_prefix("gpu-"))
            .and_then(|s| s.parse::<u32>().ok())
            .map(Device::Cuda)
            .unwrap_or(Device::Cpu)
    }

    fn device_key(device: Device) -> String {
        match device {
            Device::Cpu => "cpu".to_string(),
            Device::Cuda(index) => format!("cuda-{index}"),
        }
    }

    /// Loads (once) and caches an `OnnxDetectionEngine` per execution
    /// provider — model loading is expensive enough that the same device
    /// should never pay for it twice across jobs in one worker process.
    async fn engine_for(&self, device: Device) -> Result<Arc<OnnxDetectionEngine>, String> {
        let key = Self::device_key(device);
        if let Some(engine) = self.engines.read().await.get(&key) {
            return Ok(Arc::clone(engine));
        }

        let mut engines = self.engines.write().await;
        if let Some(engine) = engines.get(&key) {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(
            OnnxDetectionEngine::new(self.config.detector.clone(), device)
                .map_err(|e| format!("failed to load detection engine for {key}: {e}"))?,
        );
        engines.insert(key, Arc::clone(&engine));
        Ok(engine)
    }

    /// Best-effort link from a fired event back to the rule that minted
    /// it. `Event` carries no rule id, so this matches on `event_code`
    /// against the same active-rule snapshot the emitter evaluated
    /// against; ambiguous only if two active rules for the same camera
    /// share an `event_code`, which operators are expected to avoid.
    fn rule_for_event<'a>(rules: &'a [vigil_models::Rule], event: &vigil_models::Event) -> Option<&'a vigil_models::Rule> {
        rules
            .iter()
            .find(|r| r.event_code == event.event_code && r.applies_to_camera(event.camera_id))
    }
}

#[async_trait]
impl JobHandler for PipelineHandler {
    async fn execute(&self, job: Job, gpu_id: Option<GpuId>, cancel: watch::Receiver<bool>) -> Result<(), String> {
        let info = vigil_media::probe_target(&job.source_path)
            .await
            .map_err(|e| format!("probe failed: {e}"))?;

        let zones: Vec<CameraZone> = match self.cameras.get(job.camera_id).await {
            Ok(Some(camera)) => camera.zones,
            Ok(None) => {
                warn!(camera_id = %job.camera_id, "no camera record found, evaluating with no zones");
                Vec::new()
            }
            Err(e) => return Err(format!("camera lookup failed: {e}")),
        };

        let rules = self.rules.list_active().await.map_err(|e| format!("rule lookup failed: {e}"))?;

        let device = Self::device_for(&gpu_id);
        let engine = self.engine_for(device).await?;

        let mut decoder = RawFrameDecoder::spawn(&job.source_path, info.width, info.height)
            .await
            .map_err(|e| e.to_string())?;

        let mut sampler = FrameProcessor::new(vigil_inference::FrameProcessorConfig {
            source_fps: info.fps,
            ..self.config.frame_processor
        });
        let mut tracker = ObjectTracker::new(self.config.tracker);
        let mut emitter = EventEmitter::new();

        let mut frame_number: u64 = 0;
        let result = loop {
            if *cancel.borrow() {
                break Err(WorkerError::Cancelled);
            }

            let frame = match decoder.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            if !sampler.should_sample_frame(frame_number) {
                frame_number += 1;
                continue;
            }

            if let Err(e) = self
                .process_sampled_frame(
                    &job,
                    &frame,
                    frame_number,
                    &info,
                    &engine,
                    &mut tracker,
                    &mut emitter,
                    &mut sampler,
                    &rules,
                    &zones,
                )
                .await
            {
                break Err(e);
            }

            frame_number += 1;
        };

        decoder.close().await;
        result.map_err(|e| e.to_string())
    }
}

impl PipelineHandler {
    #[allow(clippy::too_many_arguments)]
    async fn process_sampled_frame(
        &self,
        job: &Job,
        frame: &[u8],
        frame_number: u64,
        info: &vigil_media::StreamInfo,
        engine: &OnnxDetectionEngine,
        tracker: &mut ObjectTracker,
        emitter: &mut EventEmitter,
        sampler: &mut FrameProcessor,
        rules: &[vigil_models::Rule],
        zones: &[CameraZone],
    ) -> Result<(), WorkerError> {
        let detections = engine.detect(frame, info.width, info.height)?;
        let track_ids = tracker.update(frame_number, &detections);
        let observed: Vec<(vigil_models::Detection, u64)> = detections.into_iter().zip(track_ids).collect();

        let observation = FrameObservation {
            frame_number,
            detections: &observed,
            frame_width: info.width as f64,
            frame_height: info.height as f64,
        };

        let fired = emitter.evaluate(Instant::now(), job.camera_id, rules, &observation, zones);
        if fired.is_empty() {
            return Ok(());
        }
        sampler.record_event(frame_number);

        for mut event in fired {
            metrics::counter!("worker_events_emitted").increment(1);

            let source = std::path::Path::new(&job.source_path);
            attach_clip(&mut event, source, &self.config.clips_root, info.fps, info.frame_count).await?;

            let rule = Self::rule_for_event(rules, &event);
            if let Some(rule) = rule {
                dispatch_alerts(&self.alert_sender, &event, rule).await;
            } else {
                warn!(event_code = %event.event_code, "no active rule matched fired event, skipping alert dispatch");
            }

            info!(
                event_id = %event.id,
                event_code = %event.event_code,
                frame_number,
                "event fired"
            );
            self.events.insert(event).await?;
        }

        Ok(())
    }
}
