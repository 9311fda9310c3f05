//! Event emission error types.

use thiserror::Error;

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("media error: {0}")]
    Media(#[from] vigil_media::MediaError),

    #[error("unknown zone: {0}")]
    UnknownZone(String),
}
