//! API error type: status-code mapping plus environment-gated detail
//! redaction.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("too many requests")]
    RateLimited,

    #[error(transparent)]
    Orchestrator(#[from] vigil_orchestrator::OrchestratorError),

    #[error(transparent)]
    Repo(#[from] vigil_repo::RepoError),

    #[error(transparent)]
    Media(#[from] vigil_media::MediaError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Orchestrator(vigil_orchestrator::OrchestratorError::JobNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Orchestrator(vigil_orchestrator::OrchestratorError::InvalidTransition(_, _)) => {
                StatusCode::CONFLICT
            }
            ApiError::Orchestrator(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Repo(vigil_repo::RepoError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Repo(vigil_repo::RepoError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Repo(vigil_repo::RepoError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the detail text is safe to echo to a caller. Redacted in
    /// production for anything that could leak backend internals.
    fn public_detail(&self, production: bool) -> String {
        let internal = matches!(
            self,
            ApiError::Internal(_) | ApiError::Orchestrator(_) | ApiError::Repo(_)
        );
        if production && internal {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let production = std::env::var("ENVIRONMENT").as_deref() == Ok("production");
        let status = self.status_code();
        let body = ErrorResponse {
            detail: self.public_detail(production),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn internal_detail_is_redacted_in_production() {
        let err = ApiError::internal("db connection string leaked");
        assert_eq!(err.public_detail(true), "An internal error occurred");
        assert!(err.public_detail(false).contains("leaked"));
    }
}
