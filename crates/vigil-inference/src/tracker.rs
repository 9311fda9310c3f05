//! IoU-based cross-frame identity tracker, owned by one worker for the
//! duration of a chunk. Never persisted.

use std::collections::BTreeMap;

use vigil_models::{Detection, Track};

const DEFAULT_IOU_THRESHOLD: f32 = 0.3;
const DEFAULT_MAX_DISAPPEARED: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub iou_threshold: f32,
    pub max_disappeared: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_disappeared: DEFAULT_MAX_DISAPPEARED,
        }
    }
}

/// Matches detections to existing tracks by max IoU, ties broken by
/// lowest track id. Dropped tracks free their id for reuse only after
/// `reset()` — ids are never recycled mid-run.
pub struct ObjectTracker {
    config: TrackerConfig,
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
}

impl ObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Feeds one frame's detections through the tracker, in strict frame
    /// order within a camera+chunk. Returns the (possibly new) track id
    /// assigned to each input detection, in the same order.
    pub fn update(&mut self, frame_number: u64, detections: &[Detection]) -> Vec<u64> {
        let mut matched_tracks: Vec<bool> = vec![false; self.tracks.len()];
        let track_ids: Vec<u64> = self.tracks.keys().copied().collect();
        let mut assigned = Vec::with_capacity(detections.len());

        for detection in detections {
            let mut best: Option<(usize, f32)> = None;
            for (slot, &track_id) in track_ids.iter().enumerate() {
                if matched_tracks[slot] {
                    continue;
                }
                let track = &self.tracks[&track_id];
                let iou = track.bbox.iou(&detection.bbox);
                if iou < self.config.iou_threshold {
                    continue;
                }
                match best {
                    Some((_, best_iou)) if iou <= best_iou => {}
                    _ => best = Some((slot, iou)),
                }
            }

            match best {
                Some((slot, _)) => {
                    let track_id = track_ids[slot];
                    matched_tracks[slot] = true;
                    let track = self.tracks.get_mut(&track_id).expect("matched slot exists");
                    track.bbox = detection.bbox;
                    track.last_seen_frame = frame_number;
                    track.detection_count += 1;
                    track.disappeared = 0;
                    assigned.push(track_id);
                }
                None => {
                    let track_id = self.next_id;
                    self.next_id += 1;
                    self.tracks.insert(
                        track_id,
                        Track::new(track_id, frame_number, detection.bbox, detection.class_name.clone()),
                    );
                    assigned.push(track_id);
                }
            }
        }

        for (slot, &track_id) in track_ids.iter().enumerate() {
            if matched_tracks[slot] {
                continue;
            }
            if let Some(track) = self.tracks.get_mut(&track_id) {
                track.disappeared += 1;
            }
        }

        self.tracks.retain(|_, t| t.disappeared <= self.config.max_disappeared);

        assigned
    }

    /// Clears all state and resets the id counter to 1.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::BBox;

    fn detection_at(class_name: &str, confidence: f32, bbox: BBox) -> Detection {
        Detection {
            class_id: 0,
            class_name: class_name.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn consistent_detection_retains_same_track_id() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);

        let ids_frame_0 = tracker.update(0, &[detection_at("person", 0.9, bbox)]);
        let ids_frame_1 = tracker.update(1, &[detection_at("person", 0.9, bbox)]);
        let ids_frame_2 = tracker.update(2, &[detection_at("person", 0.9, bbox)]);

        assert_eq!(ids_frame_0, vec![1]);
        assert_eq!(ids_frame_0, ids_frame_1);
        assert_eq!(ids_frame_1, ids_frame_2);
    }

    #[test]
    fn track_is_dropped_after_max_disappeared_plus_one_absent_frames() {
        let config = TrackerConfig {
            iou_threshold: 0.3,
            max_disappeared: 2,
        };
        let mut tracker = ObjectTracker::new(config);
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);

        tracker.update(0, &[detection_at("person", 0.9, bbox)]);
        tracker.update(1, &[]);
        tracker.update(2, &[]);
        assert_eq!(tracker.tracks().count(), 1);

        tracker.update(3, &[]);
        assert_eq!(tracker.tracks().count(), 0);
    }

    #[test]
    fn ties_are_broken_by_lowest_track_id() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let bbox_a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let bbox_b = BBox::new(100.0, 100.0, 110.0, 110.0);

        tracker.update(0, &[detection_at("person", 0.9, bbox_a), detection_at("person", 0.9, bbox_b)]);
        // Both candidates tie at IoU 1.0 with an identical-bbox detection;
        // the lowest existing track id (1) must win.
        let ids = tracker.update(1, &[detection_at("person", 0.9, bbox_a)]);
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn reset_clears_state_and_restarts_id_counter() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
        tracker.update(0, &[detection_at("person", 0.9, bbox)]);
        tracker.reset();
        assert_eq!(tracker.tracks().count(), 0);
        let ids = tracker.update(0, &[detection_at("person", 0.9, bbox)]);
        assert_eq!(ids, vec![1]);
    }
}
