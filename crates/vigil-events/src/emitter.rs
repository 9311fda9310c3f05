//! Fires rules against frame observations and mints events, enforcing a
//! per-(rule, track) debounce window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;
use vigil_models::{CameraId, CameraZone, Event, EventId, Rule, RuleId};

use crate::condition::{evaluate_all, matching_detections, FrameObservation};

pub const DEFAULT_DEBOUNCE_SECS: u64 = 10;

/// Evaluates active rules frame by frame and mints `Event`s, suppressing
/// repeat fires from the same (rule, track) pair inside the rule's
/// debounce window.
#[derive(Default)]
pub struct EventEmitter {
    last_fired: HashMap<(RuleId, u64), Instant>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates every rule in `rules` that applies to `camera_id` against
    /// `observation`. A rule fires when its conditions all hold and its
    /// highest-confidence matching detection clears `confidence_threshold`;
    /// the track carrying that detection is the one charged against the
    /// rule's debounce window. `now` is threaded through explicitly so
    /// callers (and tests) control the clock rather than relying on
    /// wall-clock `Instant::now()` inside this method.
    pub fn evaluate(
        &mut self,
        now: Instant,
        camera_id: CameraId,
        rules: &[Rule],
        observation: &FrameObservation<'_>,
        zones: &[CameraZone],
    ) -> Vec<Event> {
        let mut fired = Vec::new();

        for rule in rules {
            if !rule.applies_to_camera(camera_id) {
                continue;
            }
            if !evaluate_all(&rule.conditions, observation, zones) {
                continue;
            }

            let Some((detection, track_id)) = matching_detections(&rule.conditions, observation, zones)
                .into_iter()
                .max_by(|a, b| a.0.confidence.total_cmp(&b.0.confidence))
            else {
                continue;
            };
            if detection.confidence < rule.confidence_threshold {
                continue;
            }

            let key = (rule.id, *track_id);
            if let Some(last) = self.last_fired.get(&key) {
                if now.saturating_duration_since(*last) < rule.debounce() {
                    debug!(rule_id = %rule.id, track_id, "rule suppressed by debounce window");
                    continue;
                }
            }
            self.last_fired.insert(key, now);

            fired.push(Event {
                id: EventId::new(),
                camera_id,
                event_type: rule.event_type.clone(),
                event_code: rule.event_code.clone(),
                severity: rule.severity,
                confidence: detection.confidence,
                timestamp: chrono::Utc::now(),
                frame_number: Some(observation.frame_number),
                clip_path: None,
                metadata: serde_json::Value::Null,
                acknowledged: false,
                acknowledged_by: None,
                acknowledged_at: None,
            });
        }

        fired
    }

    /// Drops debounce state older than `max_age` so long-running emitters
    /// don't grow unbounded for tracks that disappeared long ago.
    pub fn prune(&mut self, now: Instant, max_age: Duration) {
        self.last_fired.retain(|_, last| now.saturating_duration_since(*last) < max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::{BBox, Condition, Detection, Severity};

    fn rule(conditions: Vec<Condition>, debounce_secs: u64) -> Rule {
        Rule {
            id: RuleId::new(),
            name: "test-rule".to_string(),
            event_code: "no_ppe".to_string(),
            event_type: "safety".to_string(),
            is_active: true,
            severity: Severity::High,
            confidence_threshold: 0.5,
            camera_ids: vec![],
            conditions,
            alert_targets: vec![],
            debounce_secs,
        }
    }

    fn detection(confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: "person".to_string(),
            confidence,
            bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    fn detection_of(class_name: &str, confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: class_name.to_string(),
            confidence,
            bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn firing_rule_mints_event_with_rule_fields() {
        let mut emitter = EventEmitter::new();
        let camera_id = CameraId::new();
        let rules = vec![rule(
            vec![Condition::RequiredClassPresent {
                class_name: "person".to_string(),
            }],
            10,
        )];
        let detections = vec![(detection(0.9), 1)];
        let observation = FrameObservation {
            frame_number: 42,
            detections: &detections,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };

        let events = emitter.evaluate(Instant::now(), camera_id, &rules, &observation, &[]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_code, "no_ppe");
        assert_eq!(events[0].frame_number, Some(42));
    }

    #[test]
    fn second_fire_within_debounce_window_is_suppressed() {
        let mut emitter = EventEmitter::new();
        let camera_id = CameraId::new();
        let rules = vec![rule(
            vec![Condition::RequiredClassPresent {
                class_name: "person".to_string(),
            }],
            10,
        )];
        let detections = vec![(detection(0.9), 1)];
        let observation = FrameObservation {
            frame_number: 1,
            detections: &detections,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };

        let t0 = Instant::now();
        let first = emitter.evaluate(t0, camera_id, &rules, &observation, &[]);
        assert_eq!(first.len(), 1);

        let t1 = t0 + Duration::from_secs(2);
        let second = emitter.evaluate(t1, camera_id, &rules, &observation, &[]);
        assert!(second.is_empty());

        let t2 = t0 + Duration::from_secs(11);
        let third = emitter.evaluate(t2, camera_id, &rules, &observation, &[]);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn rule_scoped_to_other_camera_never_fires() {
        let mut emitter = EventEmitter::new();
        let other_camera = CameraId::new();
        let mut r = rule(
            vec![Condition::RequiredClassPresent {
                class_name: "person".to_string(),
            }],
            10,
        );
        r.camera_ids = vec![other_camera];
        let detections = vec![(detection(0.9), 1)];
        let observation = FrameObservation {
            frame_number: 1,
            detections: &detections,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };

        let events = emitter.evaluate(Instant::now(), CameraId::new(), &[r], &observation, &[]);
        assert!(events.is_empty());
    }

    #[test]
    fn below_confidence_threshold_does_not_fire() {
        let mut emitter = EventEmitter::new();
        let camera_id = CameraId::new();
        let rules = vec![rule(
            vec![Condition::RequiredClassPresent {
                class_name: "person".to_string(),
            }],
            10,
        )];
        let detections = vec![(detection(0.1), 1)];
        let observation = FrameObservation {
            frame_number: 1,
            detections: &detections,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };

        let events = emitter.evaluate(Instant::now(), camera_id, &rules, &observation, &[]);
        assert!(events.is_empty());
    }

    #[test]
    fn firing_detection_and_confidence_are_drawn_from_matching_detections_only() {
        let mut emitter = EventEmitter::new();
        let camera_id = CameraId::new();
        let rules = vec![rule(
            vec![Condition::RequiredClassPresent {
                class_name: "forklift".to_string(),
            }],
            10,
        )];
        // An unrelated, higher-confidence "person" detection shares the frame
        // with the forklift the rule actually cares about.
        let detections = vec![(detection_of("forklift", 0.4), 1), (detection_of("person", 0.95), 2)];
        let observation = FrameObservation {
            frame_number: 1,
            detections: &detections,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };

        // The rule's threshold (0.5) clears the person's 0.95 but not the
        // forklift's 0.4 — a correct implementation must not fire here.
        let events = emitter.evaluate(Instant::now(), camera_id, &rules, &observation, &[]);
        assert!(events.is_empty());
    }
}
