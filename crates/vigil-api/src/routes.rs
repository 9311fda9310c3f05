//! Router composition: nested per-feature routers with a shared
//! outer-to-inner middleware stack.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::handlers::{events, health, ingestion};
use crate::middleware::{cors_layer, rate_limit_middleware, security_headers, RateLimiterCache};
use crate::state::AppState;

pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps, state.config.rate_limit_burst));

    let ingestion_routes = Router::new()
        .route("/ingestion/upload", post(ingestion::upload))
        .route("/ingestion/cameras/:id/start-stream", post(ingestion::start_stream))
        .route("/ingestion/cameras/:id/test-stream", post(ingestion::test_stream_handler))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let event_routes = Router::new()
        .route("/events", get(events::list_events))
        .route("/events/:id/acknowledge", post(events::acknowledge_event));

    let api_routes = Router::new().merge(ingestion_routes).merge(event_routes);

    let health_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/ready", get(health::ready));

    let metrics_routes = Router::new().route(
        "/metrics",
        get(move || {
            let handle = metrics_handle.clone();
            async move {
                match handle {
                    Some(h) => (StatusCode::OK, h.render()),
                    None => (StatusCode::NOT_FOUND, String::new()),
                }
            }
        }),
    );

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(security_headers))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
