//! Rule evaluation, event emission, clip extraction, and alert fan-out
//! for the orchestration core's detection pipeline.

pub mod alert_sink;
pub mod clip_extractor;
pub mod condition;
pub mod emitter;
pub mod error;

pub use alert_sink::{alert_channel, dispatch_alerts, AlertReceiver, AlertSender};
pub use clip_extractor::attach_clip;
pub use condition::{evaluate, evaluate_all, matching_detections, FrameObservation};
pub use emitter::{EventEmitter, DEFAULT_DEBOUNCE_SECS};
pub use error::{EventError, EventResult};
