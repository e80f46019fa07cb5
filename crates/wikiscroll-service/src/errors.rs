use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::generator::GenerationError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    ValidationError(#[from] crate::validation::ValidationError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Source URL already exists with a different title")]
    DuplicateSourceUrl,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Content generation is not configured")]
    GenerationUnavailable,

    #[error("Internal server error")]
    InternalError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::ValidationError(ref err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::AuthenticationRequired => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::DuplicateSourceUrl => (StatusCode::CONFLICT, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Generation(ref err) => {
                let status = match err {
                    GenerationError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                    GenerationError::QuotaExhausted => StatusCode::PAYMENT_REQUIRED,
                    GenerationError::Failed(detail) => {
                        error!(detail = %detail, "Content generation failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.user_message().to_string())
            }
            ApiError::GenerationUnavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::DatabaseError(ref err) => {
                // Log the detailed error but don't expose it to the client
                error!(error = %err, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
