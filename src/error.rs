use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::recipes::mapper::MapError;
use crate::spoonacular::client::ProviderError;

/// Service-level error taxonomy. Lower layers raise their own narrow error
/// types ([`ProviderError`], [`MapError`]); everything converges here before
/// the HTTP layer translates to a status code.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Persistence(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ServiceError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Persistence(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider { status, .. } => match status {
                Some(404) => StatusCode::NOT_FOUND,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Detail string served to clients. Validation, not-found and ownership
    /// messages are safe to pass through; upstream and internal details stay
    /// in the logs.
    fn public_detail(&self) -> String {
        match self {
            Self::Configuration(_) => "External API client configuration error.".into(),
            Self::RateLimited(_) => {
                "External API rate limit exceeded. Please try again later.".into()
            }
            Self::Provider { .. } => "External API error. Please try again later.".into(),
            Self::Persistence(_) => "An internal server error occurred.".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::RateLimited(detail) => warn!(%detail, "provider rate limit hit"),
            Self::Provider { message, .. } => error!(detail = %message, "provider failure"),
            Self::Persistence(detail) => error!(%detail, "persistence failure"),
            Self::Configuration(detail) => error!(%detail, "configuration failure"),
            _ => {}
        }
        let body = ErrorBody {
            detail: self.public_detail(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ProviderError> for ServiceError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Configuration(message) => Self::Configuration(message),
            ProviderError::RateLimited(message) => Self::RateLimited(message),
            ProviderError::Request { status, message } => Self::Provider { status, message },
        }
    }
}

impl From<MapError> for ServiceError {
    fn from(e: MapError) -> Self {
        Self::Validation(e.to_string())
    }
}
