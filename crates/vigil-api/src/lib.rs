//! HTTP API: ingestion endpoints, event queries, and operational
//! endpoints — `state.rs`, `error.rs`, `config.rs`, `routes.rs`,
//! `handlers/`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
