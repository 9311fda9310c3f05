//! Stream Source, Chunker, Validator, and clip extraction — everything the
//! orchestration core needs from FFmpeg without owning inference itself.

pub mod chunker;
pub mod clip;
pub mod command;
pub mod error;
pub mod probe;
pub mod source;
pub mod validator;

pub use chunker::{chunk_file, ChunkerConfig, DEFAULT_CHUNK_DURATION_SECS};
pub use clip::{extract_clip, DEFAULT_CLIP_PADDING_SECS};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_file, probe_target, StreamInfo};
pub use source::{test_stream, FileSource, FrameHandle, HttpSource, RtspSource, StreamSource};
pub use validator::{validate_file_upload, validate_stream_url, MAX_UPLOAD_BYTES};
