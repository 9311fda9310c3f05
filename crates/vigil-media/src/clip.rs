//! Extracts a padded clip around a firing frame, preserving codec across
//! the source chunk's boundary.

use std::path::Path;

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

pub const DEFAULT_CLIP_PADDING_SECS: f64 = 5.0;

/// Copies frames `[frame_number - padding*fps, frame_number + padding*fps)`
/// from `input`, clamped to `[0, frame_count)`, into `output`. Returns
/// `Ok(None)` (and removes any partial output file) if the clamped range
/// yields zero frames, so the caller can leave `clip_path` unset.
pub async fn extract_clip(
    input: &Path,
    output: &Path,
    frame_number: u64,
    fps: f64,
    frame_count: u64,
    padding_secs: f64,
) -> MediaResult<Option<()>> {
    let pad_frames = (padding_secs * fps).round() as i64;
    let start_frame = (frame_number as i64 - pad_frames).max(0) as u64;
    let end_frame = ((frame_number as i64 + pad_frames) as u64).min(frame_count);

    if end_frame <= start_frame {
        return Ok(None);
    }

    let start_secs = start_frame as f64 / fps;
    let duration_secs = (end_frame - start_frame) as f64 / fps;

    info!(
        input = %input.display(),
        output = %output.display(),
        start_frame,
        end_frame,
        "extracting event clip"
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .duration(duration_secs)
        .copy_codecs();

    FfmpegRunner::new().run(&cmd).await?;

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(Some(())),
        _ => {
            let _ = tokio::fs::remove_file(output).await;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_window_clamps_to_frame_bounds() {
        let fps: f64 = 30.0;
        let padding_secs: f64 = 5.0;
        let pad_frames = (padding_secs * fps).round() as i64;
        assert_eq!(pad_frames, 150);

        let frame_number = 120_i64;
        let start = (frame_number - pad_frames).max(0);
        assert_eq!(start, 0);

        let end = ((frame_number + pad_frames) as u64).min(10_000);
        assert_eq!(end, 270);
    }
}
