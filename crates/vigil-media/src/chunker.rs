//! Splits a bounded file source into fixed-duration chunks addressable by
//! (camera, job, index).

use std::path::{Path, PathBuf};

use tracing::{error, warn};
use vigil_models::{CameraId, Chunk, JobId};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_file;

pub const DEFAULT_CHUNK_DURATION_SECS: f64 = 300.0;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_duration_secs: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: DEFAULT_CHUNK_DURATION_SECS,
        }
    }
}

impl ChunkerConfig {
    pub fn from_env() -> Self {
        let chunk_duration_secs = std::env::var("CHUNK_DURATION_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_DURATION_SECS);
        Self { chunk_duration_secs }
    }
}

/// Splits `source_path` into chunks under `output_dir`, writing
/// `chunk_<camera>_<job>_<NNNN>.mp4` for each and preserving codec via
/// stream copy. The final chunk is dropped (file removed, not emitted) if
/// it would receive zero frames.
///
/// On an unopenable source, returns an empty sequence and logs the error
/// rather than propagating a fatal error — chunking failures are
/// recoverable at the upload site.
pub async fn chunk_file(
    source_path: &Path,
    camera_id: CameraId,
    job_id: JobId,
    output_dir: &Path,
    config: ChunkerConfig,
) -> Vec<Chunk> {
    let info = match probe_file(source_path).await {
        Ok(info) => info,
        Err(err) => {
            error!(error = %err, path = %source_path.display(), "chunker: source unopenable");
            return Vec::new();
        }
    };

    if info.fps <= 0.0 || info.frame_count == 0 {
        warn!(path = %source_path.display(), "chunker: source has no frames");
        return Vec::new();
    }

    let frames_per_chunk = (info.fps * config.chunk_duration_secs).floor() as u64;
    let frames_per_chunk = frames_per_chunk.max(1);
    let chunk_count = info.frame_count.div_ceil(frames_per_chunk);

    if let Err(err) = tokio::fs::create_dir_all(output_dir).await {
        error!(error = %err, dir = %output_dir.display(), "chunker: cannot create output dir");
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(chunk_count as usize);

    for index in 0..chunk_count {
        let start_frame = index * frames_per_chunk;
        let remaining = info.frame_count.saturating_sub(start_frame);
        let frames_in_chunk = remaining.min(frames_per_chunk);
        if frames_in_chunk == 0 {
            break;
        }

        let end_frame = start_frame + frames_in_chunk - 1;
        let start_secs = start_frame as f64 / info.fps;
        let duration_secs = frames_in_chunk as f64 / info.fps;

        let filename = format!("chunk_{}_{}_{:04}.mp4", camera_id, job_id, index);
        let output_path = output_dir.join(&filename);

        let cmd = FfmpegCommand::new(source_path, &output_path)
            .seek(start_secs)
            .duration(duration_secs)
            .copy_codecs();

        let run_failed = match FfmpegRunner::new().run(&cmd).await {
            Ok(()) => false,
            Err(err) => {
                error!(error = %err, chunk_index = index, "chunker: mid-stream write failure, truncating sequence");
                true
            }
        };

        match is_nonempty(&output_path).await {
            Ok(true) => {
                chunks.push(Chunk {
                    chunk_index: index as u32,
                    start_frame,
                    end_frame,
                    fps: info.fps,
                    width: info.width,
                    height: info.height,
                    path: output_path,
                });
            }
            Ok(false) | Err(_) => {
                let _ = tokio::fs::remove_file(&output_path).await;
            }
        }

        if run_failed {
            break;
        }
    }

    chunks
}

async fn is_nonempty(path: &Path) -> MediaResult<bool> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(meta.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_per_chunk_floors_and_chunk_count_ceils() {
        let fps = 30.0_f64;
        let chunk_duration = 5.0_f64;
        let frames_per_chunk = (fps * chunk_duration).floor() as u64;
        assert_eq!(frames_per_chunk, 150);

        let total_frames = 300_u64; // 10s @ 30fps
        let chunk_count = total_frames.div_ceil(frames_per_chunk);
        assert_eq!(chunk_count, 2);

        let total_frames = 301_u64;
        let chunk_count = total_frames.div_ceil(frames_per_chunk);
        assert_eq!(chunk_count, 3);
    }

    #[test]
    fn default_chunk_duration_is_five_minutes() {
        assert_eq!(ChunkerConfig::default().chunk_duration_secs, 300.0);
    }
}
