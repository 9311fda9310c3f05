//! Liveness/readiness probes and the queue stats snapshot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// GET /healthz
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub queue_length: u64,
    pub available_gpus: usize,
}

/// GET /ready
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    let stats = state
        .orchestrator
        .get_queue_stats()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(ReadyResponse {
        status: "ready".to_string(),
        queue_length: stats.queue_length,
        available_gpus: stats.available_gpus,
    }))
}
