//! Worker binary: pulls jobs off the shared queue and runs them through
//! the decode/detect/track/emit pipeline. No HTTP surface — the API
//! binary owns ingestion and status; this process only drains jobs.

use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil_gpu::{GpuRegistry, NullProbe};
use vigil_orchestrator::{Clock, Dispatcher, Orchestrator, OrchestratorConfig, SystemClock};
use vigil_queue::PriorityQueue;
use vigil_repo::{InMemoryAlertRepository, InMemoryCameraRepository, InMemoryEventRepository, InMemoryRuleRepository};
use vigil_worker::{PipelineHandler, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info,tower_http=info"));

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(true).pretty())
            .init();
    }

    let queue = match PriorityQueue::from_env() {
        Ok(queue) => queue,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to job queue");
            std::process::exit(1);
        }
    };
    let gpu_registry = Arc::new(GpuRegistry::new(Arc::new(NullProbe)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(queue),
        gpu_registry,
        clock,
        OrchestratorConfig::from_env(),
    ));

    let handler = Arc::new(PipelineHandler::new(
        WorkerConfig::from_env(),
        Arc::new(InMemoryCameraRepository::default()),
        Arc::new(InMemoryRuleRepository::default()),
        Arc::new(InMemoryEventRepository::default()),
        Arc::new(InMemoryAlertRepository::default()),
    ));

    let dispatcher = Dispatcher::new(orchestrator, handler);
    let shutdown = dispatcher.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, draining in-flight jobs");
            let _ = shutdown.send(true);
        }
    });

    dispatcher.run().await;
}
