//! Event: a persisted record of a rule firing. Immutable except for the
//! acknowledgement triple.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{CameraId, EventId};
use crate::rule::Severity;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub id: EventId,
    pub camera_id: CameraId,
    pub event_type: String,
    pub event_code: String,
    pub severity: Severity,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn acknowledge(&mut self, by: impl Into<String>) {
        self.acknowledged = true;
        self.acknowledged_by = Some(by.into());
        self.acknowledged_at = Some(Utc::now());
    }
}
