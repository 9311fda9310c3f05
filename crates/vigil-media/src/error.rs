//! Error types for stream, chunk, and clip operations.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH")]
    FfprobeNotFound,

    #[error("ffmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffprobe command failed: {message}")]
    FfprobeFailed { message: String, stderr: Option<String> },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("path is not a regular file: {0}")]
    NotARegularFile(PathBuf),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("invalid stream url: {0}")]
    InvalidStreamUrl(String),

    #[error("file is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("file size {0} bytes exceeds maximum of {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("open timed out after {0}ms probing first frame")]
    OpenTimeout(u64),

    #[error("source is not open")]
    NotOpen,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("http probe error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid video stream: {0}")]
    InvalidVideo(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
