//! Shared application state, constructed once in `main.rs` and injected
//! into every handler via axum's `State` extractor.

use std::sync::Arc;

use vigil_gpu::{GpuRegistry, NullProbe};
use vigil_orchestrator::{Clock, Orchestrator, OrchestratorConfig, SystemClock};
use vigil_queue::PriorityQueue;
use vigil_repo::{AlertRepository, CameraRepository, EventRepository, InMemoryAlertRepository, InMemoryCameraRepository, InMemoryEventRepository, InMemoryRuleRepository, RuleRepository};

use crate::config::ApiConfig;

/// Bundles the four repository traits behind one handle. The contract
/// itself stays split (`vigil-repo` has no single `Repository` supertrait)
/// because cameras/rules/events/alerts are backed independently; this is
/// just the handler-facing grouping.
pub struct Repo {
    pub cameras: Arc<dyn CameraRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub events: Arc<dyn EventRepository>,
    pub alerts: Arc<dyn AlertRepository>,
}

impl Repo {
    /// In-process store. Swapping in a durable backend means implementing
    /// the four traits and constructing this the same way.
    pub fn in_memory() -> Self {
        Self {
            cameras: Arc::new(InMemoryCameraRepository::default()),
            rules: Arc::new(InMemoryRuleRepository::default()),
            events: Arc::new(InMemoryEventRepository::default()),
            alerts: Arc::new(InMemoryAlertRepository::default()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub repo: Arc<Repo>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let queue = PriorityQueue::from_env()?;
        let gpu_registry = Arc::new(GpuRegistry::new(Arc::new(NullProbe)));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let orchestrator = Orchestrator::new(
            Arc::new(queue),
            gpu_registry,
            clock,
            OrchestratorConfig::from_env(),
        );

        Ok(Self {
            config,
            orchestrator,
            repo: Arc::new(Repo::in_memory()),
        })
    }
}
