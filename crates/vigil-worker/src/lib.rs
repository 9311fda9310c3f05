//! Worker pipeline: decodes frames, runs inference, evaluates rules, and
//! dispatches alerts for jobs the orchestrator hands out.

mod config;
mod decoder;
mod error;
mod pipeline;

pub use config::WorkerConfig;
pub use decoder::RawFrameDecoder;
pub use error::{WorkerError, WorkerResult};
pub use pipeline::{spawn_alert_sink, PipelineHandler};
