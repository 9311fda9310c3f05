//! Evaluates a rule's tagged-union conditions against one frame's
//! detections.

use vigil_models::{CameraZone, Condition, Detection};

/// One frame's worth of detections, each paired with the track id the
/// `ObjectTracker` assigned it. Detection bboxes are in pixel space;
/// `frame_width`/`frame_height` let `InZone` compare against normalized
/// zone bounds.
pub struct FrameObservation<'a> {
    pub frame_number: u64,
    pub detections: &'a [(Detection, u64)],
    pub frame_width: f64,
    pub frame_height: f64,
}

/// Whether `condition` holds for at least one detection in `observation`,
/// scoped to `zones` for `InZone`. `RequiredPpeAbsent` additionally needs
/// a `person` detection present to anchor the check — a PPE class being
/// globally absent with no person in frame is not a violation.
pub fn evaluate(condition: &Condition, observation: &FrameObservation<'_>, zones: &[CameraZone]) -> bool {
    match condition {
        Condition::RequiredClassPresent { class_name } => observation
            .detections
            .iter()
            .any(|(d, _)| &d.class_name == class_name),
        Condition::RequiredPpeAbsent { ppe } => {
            let has_person = observation.detections.iter().any(|(d, _)| d.class_name == "person");
            let has_any_ppe = observation
                .detections
                .iter()
                .any(|(d, _)| ppe.iter().any(|p| p == &d.class_name));
            has_person && !has_any_ppe
        }
        Condition::InZone { zone_id } => {
            let Some(zone) = zones.iter().find(|z| &z.zone_id == zone_id) else {
                return false;
            };
            observation.detections.iter().any(|(d, _)| {
                let (cx, cy) = d.center();
                let nx = cx as f64 / observation.frame_width;
                let ny = cy as f64 / observation.frame_height;
                zone.bounds.contains(nx, ny)
            })
        }
        Condition::MinConfidence { threshold } => {
            observation.detections.iter().any(|(d, _)| d.confidence >= *threshold)
        }
    }
}

/// All conditions must hold (AND) for the rule to fire on this frame.
pub fn evaluate_all(conditions: &[Condition], observation: &FrameObservation<'_>, zones: &[CameraZone]) -> bool {
    conditions.iter().all(|c| evaluate(c, observation, zones))
}

/// Whether `detection` is the kind of evidence `condition` is actually
/// about, as opposed to merely present somewhere in the same frame.
/// `RequiredPpeAbsent` anchors on the `person` detection since the
/// condition itself is about an absence, not a class match.
fn detection_matches(
    condition: &Condition,
    detection: &Detection,
    observation: &FrameObservation<'_>,
    zones: &[CameraZone],
) -> bool {
    match condition {
        Condition::RequiredClassPresent { class_name } => &detection.class_name == class_name,
        Condition::RequiredPpeAbsent { .. } => detection.class_name == "person",
        Condition::InZone { zone_id } => {
            let Some(zone) = zones.iter().find(|z| &z.zone_id == zone_id) else {
                return false;
            };
            let (cx, cy) = detection.center();
            let nx = cx as f64 / observation.frame_width;
            let ny = cy as f64 / observation.frame_height;
            zone.bounds.contains(nx, ny)
        }
        Condition::MinConfidence { threshold } => detection.confidence >= *threshold,
    }
}

/// Detections consistent with every condition in `conditions` — the
/// candidate pool a firing rule's confidence/track selection must be
/// drawn from, rather than the frame's detections at large.
pub fn matching_detections<'a>(
    conditions: &[Condition],
    observation: &FrameObservation<'a>,
    zones: &[CameraZone],
) -> Vec<&'a (Detection, u64)> {
    observation
        .detections
        .iter()
        .filter(|(d, _)| conditions.iter().all(|c| detection_matches(c, d, observation, zones)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::BBox;

    fn detection(class_name: &str, confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: class_name.to_string(),
            confidence,
            bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn required_class_present_matches_by_name() {
        let observed = vec![(detection("person", 0.9), 1)];
        let obs = FrameObservation {
            frame_number: 1,
            detections: &observed,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };
        let condition = Condition::RequiredClassPresent {
            class_name: "person".to_string(),
        };
        assert!(evaluate(&condition, &obs, &[]));
    }

    #[test]
    fn required_ppe_absent_needs_a_person_and_no_ppe() {
        let with_helmet = vec![(detection("person", 0.9), 1), (detection("helmet", 0.8), 2)];
        let obs_with_helmet = FrameObservation {
            frame_number: 1,
            detections: &with_helmet,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };
        let without_helmet = vec![(detection("person", 0.9), 1)];
        let obs_without_helmet = FrameObservation {
            frame_number: 1,
            detections: &without_helmet,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };
        let condition = Condition::RequiredPpeAbsent {
            ppe: vec!["helmet".to_string()],
        };
        assert!(!evaluate(&condition, &obs_with_helmet, &[]));
        assert!(evaluate(&condition, &obs_without_helmet, &[]));
    }

    #[test]
    fn min_confidence_requires_at_least_one_strong_detection() {
        let observed = vec![(detection("person", 0.4), 1)];
        let obs = FrameObservation {
            frame_number: 1,
            detections: &observed,
            frame_width: 1920.0,
            frame_height: 1080.0,
        };
        let condition = Condition::MinConfidence { threshold: 0.5 };
        assert!(!evaluate(&condition, &obs, &[]));
    }

    #[test]
    fn in_zone_normalizes_pixel_center_against_zone_bounds() {
        let observed = vec![(detection("person", 0.9), 1)];
        let obs = FrameObservation {
            frame_number: 1,
            detections: &observed,
            frame_width: 100.0,
            frame_height: 100.0,
        };
        let zones = vec![CameraZone {
            zone_id: "dock".to_string(),
            bounds: vigil_models::NormalizedRect {
                x: 0.0,
                y: 0.0,
                width: 0.5,
                height: 0.5,
            },
        }];
        let condition = Condition::InZone {
            zone_id: "dock".to_string(),
        };
        assert!(evaluate(&condition, &obs, &zones));
        assert!(!evaluate(
            &Condition::InZone {
                zone_id: "missing".to_string()
            },
            &obs,
            &zones
        ));
    }
}
