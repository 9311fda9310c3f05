//! Track: cross-frame object identity assigned by the ObjectTracker. Owned
//! by one worker's tracker for the duration of a chunk; never persisted.

use serde::{Deserialize, Serialize};

use crate::bbox::BBox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub track_id: u64,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
    pub bbox: BBox,
    pub class_name: String,
    pub detection_count: u32,
    /// Consecutive frames this track has gone unmatched.
    pub disappeared: u32,
}

impl Track {
    pub fn new(track_id: u64, frame_number: u64, bbox: BBox, class_name: impl Into<String>) -> Self {
        Self {
            track_id,
            first_seen_frame: frame_number,
            last_seen_frame: frame_number,
            bbox,
            class_name: class_name.into(),
            detection_count: 1,
            disappeared: 0,
        }
    }
}
