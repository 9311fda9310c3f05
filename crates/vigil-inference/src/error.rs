//! Inference engine error types.

use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("invalid frame data: {0}")]
    InvalidFrame(String),

    #[error("onnx runtime error: {0}")]
    Runtime(String),
}

impl InferenceError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}
