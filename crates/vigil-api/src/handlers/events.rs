//! Event query and acknowledgement endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use vigil_models::{CameraId, Event, EventId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub camera_id: Option<CameraId>,
    pub event_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

/// GET /api/v1/events
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let events = state
        .repo
        .events
        .list(query.camera_id, query.event_code.as_deref())
        .await?;
    Ok(Json(EventsResponse { events }))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub acknowledged_by: String,
}

/// POST /api/v1/events/:id/acknowledge
///
/// Sets the acknowledgement triple once; re-acknowledging the same event
/// is accepted (idempotent write of the same fields) but never clears it
/// back to unacknowledged.
pub async fn acknowledge_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Json(req): Json<AcknowledgeRequest>,
) -> ApiResult<Json<Event>> {
    if req.acknowledged_by.trim().is_empty() {
        return Err(ApiError::bad_request("acknowledged_by must not be empty"));
    }

    let event = state.repo.events.acknowledge(event_id, &req.acknowledged_by).await?;
    info!(event_id = %event_id, by = %req.acknowledged_by, "event acknowledged");
    Ok(Json(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_acknowledger_is_rejected_before_hitting_the_repo() {
        let req = AcknowledgeRequest { acknowledged_by: "  ".to_string() };
        assert!(req.acknowledged_by.trim().is_empty());
    }
}
