//! Persistence contracts. The core depends only on these traits; the
//! concrete backing store (Postgres, Firestore, whatever) lives outside
//! this crate's scope and is injected by the caller.

use async_trait::async_trait;

use vigil_models::{Alert, AlertId, Camera, CameraId, Event, EventId, Rule, RuleId};

use crate::error::RepoResult;

#[async_trait]
pub trait CameraRepository: Send + Sync {
    async fn get(&self, id: CameraId) -> RepoResult<Option<Camera>>;
    async fn get_by_name(&self, name: &str) -> RepoResult<Option<Camera>>;
    async fn list(&self) -> RepoResult<Vec<Camera>>;
    async fn upsert(&self, camera: Camera) -> RepoResult<()>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn get(&self, id: RuleId) -> RepoResult<Option<Rule>>;
    /// Active rules, snapshotted by the dispatcher at worker launch.
    async fn list_active(&self) -> RepoResult<Vec<Rule>>;
    async fn upsert(&self, rule: Rule) -> RepoResult<()>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn get(&self, id: EventId) -> RepoResult<Option<Event>>;
    async fn list(&self, camera_id: Option<CameraId>, event_code: Option<&str>) -> RepoResult<Vec<Event>>;
    async fn insert(&self, event: Event) -> RepoResult<()>;
    async fn acknowledge(&self, id: EventId, by: &str) -> RepoResult<Event>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn get(&self, id: AlertId) -> RepoResult<Option<Alert>>;
    async fn insert(&self, alert: Alert) -> RepoResult<()>;
    async fn update(&self, alert: Alert) -> RepoResult<()>;
}
