//! API server binary: wires configuration, shared state, the dispatch
//! loop, and the HTTP router together.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil_api::{create_router, metrics, ApiConfig, AppState};

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

    let config = ApiConfig::from_env();
    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    let metrics_handle = if std::env::var("METRICS_ENABLED").as_deref() == Ok("true") {
        Some(metrics::init_metrics())
    } else {
        None
    };

    // The dispatch loop (`vigil_orchestrator::Dispatcher::run`) needs a
    // `JobHandler` that wires media decode, inference, and event emission
    // together; that binary lives separately from the ingestion API.
    let app = create_router(state, metrics_handle);
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", config.bind_addr(), e));

    tracing::info!(addr = %config.bind_addr(), "vigil-api listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
    tracing::info!("shutdown signal received");
}
