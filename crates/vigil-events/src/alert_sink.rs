//! Turns a fired event into one pending `Alert` per configured target and
//! forwards them over a channel to whatever notification sink lives
//! outside the core.

use tokio::sync::mpsc;
use tracing::warn;
use vigil_models::{Alert, AlertId, AlertStatus, Event, Rule};

pub type AlertSender = mpsc::Sender<Alert>;
pub type AlertReceiver = mpsc::Receiver<Alert>;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub fn alert_channel() -> (AlertSender, AlertReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_CAPACITY)
}

/// Builds one `Alert` per target configured on `rule` and sends each over
/// `sender`. A full or closed channel drops the alert with a warning
/// rather than blocking the emitter loop.
pub async fn dispatch_alerts(sender: &AlertSender, event: &Event, rule: &Rule) {
    for target in &rule.alert_targets {
        let alert = Alert {
            id: AlertId::new(),
            event_id: event.id,
            rule_id: rule.id,
            channel: target.channel,
            recipient: target.recipient.clone(),
            subject: format!("{} on camera {}", rule.event_code, event.camera_id),
            message: format!(
                "{} fired with confidence {:.2} at frame {:?}",
                rule.event_code, event.confidence, event.frame_number
            ),
            status: AlertStatus::Pending,
            sent_at: None,
            acknowledged_by: None,
            acknowledged_at: None,
        };

        if let Err(err) = sender.try_send(alert) {
            warn!(
                rule_id = %rule.id,
                event_id = %event.id,
                error = %err,
                "alert channel full or closed, dropping alert"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::{AlertChannel, AlertTarget, CameraId, EventId, RuleId, Severity};

    fn sample_rule(targets: Vec<AlertTarget>) -> Rule {
        Rule {
            id: RuleId::new(),
            name: "test-rule".to_string(),
            event_code: "no_ppe".to_string(),
            event_type: "safety".to_string(),
            is_active: true,
            severity: Severity::High,
            confidence_threshold: 0.5,
            camera_ids: vec![],
            conditions: vec![],
            alert_targets: targets,
            debounce_secs: 10,
        }
    }

    fn sample_event() -> Event {
        Event {
            id: EventId::new(),
            camera_id: CameraId::new(),
            event_type: "safety".to_string(),
            event_code: "no_ppe".to_string(),
            severity: Severity::High,
            confidence: 0.8,
            timestamp: chrono::Utc::now(),
            frame_number: Some(10),
            clip_path: None,
            metadata: serde_json::Value::Null,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
        }
    }

    #[tokio::test]
    async fn one_alert_is_sent_per_target() {
        let (tx, mut rx) = alert_channel();
        let rule = sample_rule(vec![
            AlertTarget {
                channel: AlertChannel::Email,
                recipient: "ops@example.com".to_string(),
            },
            AlertTarget {
                channel: AlertChannel::Webhook,
                recipient: "https://hooks.example.com/x".to_string(),
            },
        ]);
        let event = sample_event();

        dispatch_alerts(&tx, &event, &rule).await;
        drop(tx);

        let mut received = Vec::new();
        while let Some(alert) = rx.recv().await {
            received.push(alert);
        }
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].event_id, event.id);
    }
}
