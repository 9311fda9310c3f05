//! Names and extracts the clip that accompanies a fired event.

use std::path::Path;

use chrono::Utc;
use tracing::warn;
use vigil_models::Event;

use crate::error::EventResult;

/// Extracts a padded clip around `event`'s firing frame from `source_path`
/// and, on success, sets `event.clip_path` to the file written under
/// `output_dir`. Leaves `clip_path` unset (and logs) if the event has no
/// frame number or the padded window is empty.
pub async fn attach_clip(
    event: &mut Event,
    source_path: &Path,
    output_dir: &Path,
    fps: f64,
    frame_count: u64,
) -> EventResult<()> {
    let Some(frame_number) = event.frame_number else {
        return Ok(());
    };

    let file_name = format!(
        "event_{}_camera_{}_{}.mp4",
        event.id,
        event.camera_id,
        Utc::now().format("%Y%m%dT%H%M%SZ")
    );
    let output_path = output_dir.join(&file_name);

    let extracted = vigil_media::extract_clip(
        source_path,
        &output_path,
        frame_number,
        fps,
        frame_count,
        vigil_media::DEFAULT_CLIP_PADDING_SECS,
    )
    .await?;

    match extracted {
        Some(()) => event.clip_path = Some(output_path.display().to_string()),
        None => warn!(
            event_id = %event.id,
            frame_number,
            "clip extraction yielded an empty window, leaving clip_path unset"
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::{CameraId, EventId, Severity};

    fn sample_event(frame_number: Option<u64>) -> Event {
        Event {
            id: EventId::new(),
            camera_id: CameraId::new(),
            event_type: "safety".to_string(),
            event_code: "no_ppe".to_string(),
            severity: Severity::High,
            confidence: 0.9,
            timestamp: Utc::now(),
            frame_number,
            clip_path: None,
            metadata: serde_json::Value::Null,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
        }
    }

    #[tokio::test]
    async fn event_without_frame_number_is_left_untouched() {
        let mut event = sample_event(None);
        let result = attach_clip(&mut event, Path::new("/nonexistent/in.mp4"), Path::new("/tmp"), 30.0, 1000).await;
        assert!(result.is_ok());
        assert!(event.clip_path.is_none());
    }
}
