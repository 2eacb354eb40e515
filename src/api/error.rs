use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use super::validation::RequestValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] RequestValidationError),
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: limit is {0} bytes")]
    PayloadTooLarge(usize),
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::QueryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message. Server-side failures get a generic message and
    /// carry the cause in `error`.
    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Validation(_) | ApiError::InvalidPayload(_) | ApiError::PayloadTooLarge(_) => {
                ErrorResponse {
                    success: false,
                    message: self.to_string(),
                    error: None,
                }
            }
            ApiError::QueryFailed(cause) => ErrorResponse {
                success: false,
                message: "internal server error, please try again later".to_string(),
                error: Some(cause.clone()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}
