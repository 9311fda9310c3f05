//! Inference Engine & Tracker: single-frame and batch object detection,
//! frame-rate sampling, and cross-frame identity tracking.

pub mod engine;
pub mod error;
pub mod frame_processor;
pub mod tracker;

pub use engine::{DetectionEngine, DetectorConfig, Device, OnnxDetectionEngine, COCO_CLASSES};
pub use error::{InferenceError, InferenceResult};
pub use frame_processor::{FrameProcessor, FrameProcessorConfig};
pub use tracker::{ObjectTracker, TrackerConfig};
