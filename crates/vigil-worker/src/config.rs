//! Worker configuration: detection, sampling, tracking, and clip output,
//! read once per process via `from_env`.

use std::path::PathBuf;

use vigil_inference::{DetectorConfig, FrameProcessorConfig, TrackerConfig};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub detector: DetectorConfig,
    pub frame_processor: FrameProcessorConfig,
    pub tracker: TrackerConfig,
    pub clips_root: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            frame_processor: FrameProcessorConfig::default(),
            tracker: TrackerConfig::default(),
            clips_root: PathBuf::from("clips"),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        let detector = DetectorConfig {
            model_path: std::env::var("MODEL_PATH").unwrap_or(default.detector.model_path),
            confidence_threshold: std::env::var("CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.detector.confidence_threshold),
            ..default.detector
        };

        let frame_processor = FrameProcessorConfig {
            default_fps: std::env::var("DEFAULT_FPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.frame_processor.default_fps),
            burst_fps: std::env::var("BURST_FPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.frame_processor.burst_fps),
            ..default.frame_processor
        };

        let tracker = TrackerConfig {
            iou_threshold: std::env::var("IOU_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.tracker.iou_threshold),
            ..default.tracker
        };

        let clips_root = std::env::var("CLIPS_ROOT").map(PathBuf::from).unwrap_or(default.clips_root);

        Self {
            detector,
            frame_processor,
            tracker,
            clips_root,
        }
    }
}
