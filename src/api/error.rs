use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::{ConfigError, MalformedInputError, RequestError};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    MalformedInput(#[from] MalformedInputError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Request(e) => ApiError::Request(e),
            missing @ ValidationError::MissingDocument(_) => {
                ApiError::BadRequest(missing.to_string())
            }
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MalformedInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Request(e) => match e {
                RequestError::Authentication { .. } => StatusCode::UNAUTHORIZED,
                RequestError::RateLimited { .. } | RequestError::QuotaExceeded { .. } => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                RequestError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                RequestError::Network(_)
                | RequestError::MalformedResponse(_)
                | RequestError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            ApiError::Serialization(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Config(_) => "configuration",
            ApiError::Request(e) => e.kind(),
            ApiError::MalformedInput(_) => "malformed_input",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Serialization(_) | ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}
