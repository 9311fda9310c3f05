//! Upload, stream-start, and stream-test endpoints: the entry points that
//! turn a camera's source into scheduled jobs.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vigil_media::{chunk_file, test_stream, validate_file_upload, validate_stream_url, ChunkerConfig, FileSource, HttpSource, RtspSource};
use vigil_models::{CameraId, ChunkMetadata, SourceType, StreamType};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const UPLOAD_DIR: &str = "uploads";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub camera_id: String,
    pub jobs_created: usize,
    pub job_ids: Vec<String>,
}

/// POST /api/v1/ingestion/upload
///
/// Accepts a multipart file, chunks it, and enqueues one job per chunk.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    check_backpressure(&state).await?;

    let mut camera_id: Option<CameraId> = None;
    let mut file_bytes: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
        match field.name() {
            Some("camera_id") => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                camera_id = Some(text.parse().map_err(|_| ApiError::bad_request("invalid camera_id"))?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.mp4").to_string();
                let data = field.bytes().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                file_bytes = Some((file_name, data.to_vec()));
            }
            _ => {}
        }
    }

    let camera_id = camera_id.ok_or_else(|| ApiError::bad_request("missing camera_id field"))?;
    let (file_name, bytes) = file_bytes.ok_or_else(|| ApiError::bad_request("missing file field"))?;

    let upload_dir = PathBuf::from(UPLOAD_DIR);
    tokio::fs::create_dir_all(&upload_dir).await.map_err(vigil_media::MediaError::from)?;
    let dest = upload_dir.join(format!("{}_{}", uuid::Uuid::new_v4(), file_name));
    tokio::fs::write(&dest, &bytes).await.map_err(vigil_media::MediaError::from)?;

    validate_file_upload(&dest, bytes.len() as u64)?;

    let job_id_for_chunks = vigil_models::JobId::new();
    let chunks = chunk_file(&dest, camera_id, job_id_for_chunks, &upload_dir, ChunkerConfig::from_env()).await;

    if chunks.is_empty() {
        warn!(camera_id = %camera_id, path = %dest.display(), "upload produced no chunks");
    }

    let mut job_ids = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let chunk_meta = ChunkMetadata {
            chunk_index: chunk.chunk_index,
            start_frame: chunk.start_frame,
            end_frame: chunk.end_frame,
            original_file: dest.display().to_string(),
        };
        let job_id = state
            .orchestrator
            .create_job(
                camera_id,
                SourceType::File,
                chunk.path.display().to_string(),
                serde_json::Value::Null,
                0,
                Some(chunk_meta),
            )
            .await?;
        job_ids.push(job_id.to_string());
    }

    info!(camera_id = %camera_id, jobs_created = job_ids.len(), "upload ingested");

    Ok(Json(UploadResponse {
        camera_id: camera_id.to_string(),
        jobs_created: job_ids.len(),
        job_ids,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub stream_url: String,
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Serialize)]
pub struct StartStreamResponse {
    pub job_id: String,
}

/// POST /api/v1/ingestion/cameras/:id/start-stream
///
/// Validates the stream URL and enqueues a long-running stream job. The
/// job runs until cancelled; there is no "end of stream" for RTSP/HTTP.
pub async fn start_stream(
    State(state): State<AppState>,
    Path(camera_id): Path<CameraId>,
    Json(req): Json<StartStreamRequest>,
) -> ApiResult<Json<StartStreamResponse>> {
    check_backpressure(&state).await?;
    validate_stream_url(&req.stream_url, SourceType::Stream)?;

    let job_id = state
        .orchestrator
        .create_job(
            camera_id,
            SourceType::Stream,
            req.stream_url.clone(),
            serde_json::Value::Null,
            req.priority,
            None,
        )
        .await?;

    info!(camera_id = %camera_id, job_id = %job_id, "stream job started");
    Ok(Json(StartStreamResponse { job_id: job_id.to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct TestStreamRequest {
    pub stream_url: String,
    pub stream_type: StreamType,
}

#[derive(Debug, Serialize)]
pub struct TestStreamResponse {
    pub reachable: bool,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// POST /api/v1/ingestion/cameras/:id/test-stream
///
/// Opens the source just long enough to read its stream info, then
/// closes it. Does not enqueue any job.
pub async fn test_stream_handler(
    State(_state): State<AppState>,
    Path(_camera_id): Path<CameraId>,
    Json(req): Json<TestStreamRequest>,
) -> ApiResult<Json<TestStreamResponse>> {
    validate_stream_url(&req.stream_url, SourceType::Stream)?;

    let source: Box<dyn vigil_media::StreamSource> = match req.stream_type {
        StreamType::Rtsp => Box::new(RtspSource::new(&req.stream_url)),
        StreamType::Http => Box::new(HttpSource::new(&req.stream_url)),
        StreamType::File => Box::new(FileSource::new(&req.stream_url)),
    };

    let info = test_stream(source).await?;

    Ok(Json(TestStreamResponse {
        reachable: true,
        fps: info.fps,
        width: info.width,
        height: info.height,
    }))
}

async fn check_backpressure(state: &AppState) -> ApiResult<()> {
    let stats = state.orchestrator.get_queue_stats().await?;
    if stats.queue_length > state.config.queue_high_watermark {
        warn!(queue_length = stats.queue_length, "ingestion rejected: queue above high watermark");
        return Err(ApiError::RateLimited);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_id_parses_from_uuid_string() {
        let id = CameraId::new();
        let parsed: CameraId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
