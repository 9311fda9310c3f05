//! GPU registry error types.

use thiserror::Error;

pub type GpuResult<T> = Result<T, GpuError>;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("accelerator library unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("unknown gpu id: {0}")]
    UnknownGpu(String),
}
