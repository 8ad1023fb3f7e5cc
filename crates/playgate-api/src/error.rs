use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use playgate_core::Error as CoreError;
use playgate_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Core(CoreError::Storage(err))
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(resource: &str) -> Self {
        ApiError::NotFound(format!("{} not found", resource))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => match err {
                CoreError::DuplicateUsername => StatusCode::CONFLICT,
                CoreError::InvalidCredentials
                | CoreError::TokenInvalidSignature
                | CoreError::TokenExpired => StatusCode::UNAUTHORIZED,
                CoreError::InsufficientRole => StatusCode::FORBIDDEN,
                CoreError::UserNotFound | CoreError::InvalidPlaylist | CoreError::CodeNotFound => {
                    StatusCode::NOT_FOUND
                }
                CoreError::CodeRevoked | CoreError::CodeExpired | CoreError::PlaylistExpired => {
                    StatusCode::GONE
                }
                CoreError::CodeExhausted => StatusCode::TOO_MANY_REQUESTS,
                CoreError::InvalidUsageCap | CoreError::InvalidExpiry | CoreError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Core(err) => err.kind(),
            ApiError::MissingToken => "missing_token",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "invalid_input",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
