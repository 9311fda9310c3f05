//! In-memory reference implementation of the repository contract, used by
//! tests and by standalone/dev deployments without an external store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use vigil_models::{Alert, AlertId, Camera, CameraId, Event, EventId, Rule, RuleId};

use crate::error::{RepoError, RepoResult};
use crate::traits::{AlertRepository, CameraRepository, EventRepository, RuleRepository};

#[derive(Default)]
pub struct InMemoryCameraRepository {
    cameras: RwLock<HashMap<CameraId, Camera>>,
}

#[async_trait]
impl CameraRepository for InMemoryCameraRepository {
    async fn get(&self, id: CameraId) -> RepoResult<Option<Camera>> {
        Ok(self.cameras.read().unwrap().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> RepoResult<Option<Camera>> {
        Ok(self.cameras.read().unwrap().values().find(|c| c.name == name).cloned())
    }

    async fn list(&self) -> RepoResult<Vec<Camera>> {
        Ok(self.cameras.read().unwrap().values().cloned().collect())
    }

    async fn upsert(&self, camera: Camera) -> RepoResult<()> {
        self.cameras.write().unwrap().insert(camera.id, camera);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<RuleId, Rule>>,
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn get(&self, id: RuleId) -> RepoResult<Option<Rule>> {
        Ok(self.rules.read().unwrap().get(&id).cloned())
    }

    async fn list_active(&self) -> RepoResult<Vec<Rule>> {
        Ok(self.rules.read().unwrap().values().filter(|r| r.is_active).cloned().collect())
    }

    async fn upsert(&self, rule: Rule) -> RepoResult<()> {
        self.rules.write().unwrap().insert(rule.id, rule);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: RwLock<HashMap<EventId, Event>>,
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn get(&self, id: EventId) -> RepoResult<Option<Event>> {
        Ok(self.events.read().unwrap().get(&id).cloned())
    }

    async fn list(&self, camera_id: Option<CameraId>, event_code: Option<&str>) -> RepoResult<Vec<Event>> {
        let events = self.events.read().unwrap();
        Ok(events
            .values()
            .filter(|e| camera_id.is_none_or(|c| e.camera_id == c))
            .filter(|e| event_code.is_none_or(|code| e.event_code == code))
            .cloned()
            .collect())
    }

    async fn insert(&self, event: Event) -> RepoResult<()> {
        self.events.write().unwrap().insert(event.id, event);
        Ok(())
    }

    async fn acknowledge(&self, id: EventId, by: &str) -> RepoResult<Event> {
        let mut events = self.events.write().unwrap();
        let event = events.get_mut(&id).ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        event.acknowledge(by);
        Ok(event.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAlertRepository {
    alerts: RwLock<HashMap<AlertId, Alert>>,
}

#[async_trait]
impl AlertRepository for InMemoryAlertRepository {
    async fn get(&self, id: AlertId) -> RepoResult<Option<Alert>> {
        Ok(self.alerts.read().unwrap().get(&id).cloned())
    }

    async fn insert(&self, alert: Alert) -> RepoResult<()> {
        self.alerts.write().unwrap().insert(alert.id, alert);
        Ok(())
    }

    async fn update(&self, alert: Alert) -> RepoResult<()> {
        let mut alerts = self.alerts.write().unwrap();
        if !alerts.contains_key(&alert.id) {
            return Err(RepoError::NotFound(alert.id.to_string()));
        }
        alerts.insert(alert.id, alert);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::StreamType;

    #[tokio::test]
    async fn camera_upsert_then_get_by_name() {
        let repo = InMemoryCameraRepository::default();
        let camera = Camera::new("lobby-1", StreamType::Rtsp);
        repo.upsert(camera.clone()).await.unwrap();
        let found = repo.get_by_name("lobby-1").await.unwrap().unwrap();
        assert_eq!(found.id, camera.id);
    }

    #[tokio::test]
    async fn event_acknowledge_sets_flag_and_actor() {
        let repo = InMemoryEventRepository::default();
        let event = Event {
            id: vigil_models::EventId::new(),
            camera_id: vigil_models::CameraId::new(),
            event_type: "safety".to_string(),
            event_code: "missing_helmet".to_string(),
            severity: vigil_models::Severity::High,
            confidence: 0.9,
            timestamp: chrono::Utc::now(),
            frame_number: Some(120),
            clip_path: None,
            metadata: serde_json::Value::Null,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
        };
        repo.insert(event.clone()).await.unwrap();
        let acked = repo.acknowledge(event.id, "operator-1").await.unwrap();
        assert!(acked.acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("operator-1"));
    }
}
