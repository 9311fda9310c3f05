//! Tagged-union condition types for rule evaluation.
//!
//! `Rule.conditions` is an opaque JSON blob at the repository boundary; this
//! is the internal, typed form it is parsed into. Each variant matches one
//! condition kind a rule can require before it fires.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// At least one detection of the given class is present in the frame.
    RequiredClassPresent { class_name: String },
    /// None of the listed PPE classes are present among detections whose
    /// bbox overlaps a `person` detection (missing-helmet style rules).
    RequiredPpeAbsent { ppe: Vec<String> },
    /// The firing detection's center falls within the named camera zone.
    InZone { zone_id: String },
    /// Overrides the rule's `confidence_threshold` for this condition only.
    MinConfidence { threshold: f32 },
}
