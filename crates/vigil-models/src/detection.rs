//! Detection: one object found by the Inference Engine in a single frame.
//! Ephemeral — lives only within a worker's frame-processing scope unless
//! promoted to an Event.

use serde::{Deserialize, Serialize};

use crate::bbox::BBox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }
}
