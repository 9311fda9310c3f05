//! Worker pipeline error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("source probe failed: {0}")]
    Probe(#[from] vigil_media::MediaError),

    #[error("inference failed: {0}")]
    Inference(#[from] vigil_inference::InferenceError),

    #[error("event pipeline failed: {0}")]
    Event(#[from] vigil_events::EventError),

    #[error("repository error: {0}")]
    Repo(#[from] vigil_repo::RepoError),

    #[error("job cancelled")]
    Cancelled,
}
