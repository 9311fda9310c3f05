//! Rule: an operator-defined predicate over detections/tracks that mints
//! Events. Mutated only via supervisor/admin API; the dispatcher snapshots
//! active rules at worker launch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::ids::{CameraId, RuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    Email,
    Webhook,
    InApp,
}

/// One configured alert recipient for a rule.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AlertTarget {
    pub channel: AlertChannel,
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub id: RuleId,
    /// Unique.
    pub name: String,
    pub event_code: String,
    pub event_type: String,
    pub is_active: bool,
    pub severity: Severity,
    pub confidence_threshold: f32,
    /// Empty means "applies to all cameras".
    #[serde(default)]
    pub camera_ids: Vec<CameraId>,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub alert_targets: Vec<AlertTarget>,
    /// Minimum gap, in seconds, between events from the same (rule, track_id)
    /// pair.
    pub debounce_secs: u64,
}

impl Rule {
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.debounce_secs)
    }

    /// Whether this rule even applies to the given camera (filter check
    /// only; condition/confidence evaluation happens separately).
    pub fn applies_to_camera(&self, camera_id: CameraId) -> bool {
        self.is_active && (self.camera_ids.is_empty() || self.camera_ids.contains(&camera_id))
    }
}
