//! Camera identity and status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::CameraId;
use crate::rect::NormalizedRect;

/// Transport used to pull frames for a camera's live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Rtsp,
    Http,
    File,
}

/// Operational status of a camera, set by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Error,
}

/// A named, zoned video source. Mutated only via admin-role API calls in the
/// wider system; the core treats it as read-mostly reference data.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Camera {
    pub id: CameraId,
    /// Unique display name.
    pub name: String,
    pub stream_type: StreamType,
    /// Unique when set; `None` for cameras that are only ever fed uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    pub status: CameraStatus,
    /// Named regions of interest, e.g. for `InZone` rule conditions.
    #[serde(default)]
    pub zones: Vec<CameraZone>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named polygon-ish region of a camera's frame, expressed as a normalized
/// bounding rectangle (full polygon support is left to the zone_config JSON
/// blob consumed by `InZone` conditions; this is the indexable summary).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CameraZone {
    pub zone_id: String,
    pub bounds: NormalizedRect,
}

impl Camera {
    pub fn new(name: impl Into<String>, stream_type: StreamType) -> Self {
        let now = Utc::now();
        Self {
            id: CameraId::new(),
            name: name.into(),
            stream_type,
            stream_url: None,
            status: CameraStatus::Active,
            zones: Vec::new(),
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, CameraStatus::Active)
    }
}
