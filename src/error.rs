//! Error types shared by the relay.
//!
//! Every failure that reaches the HTTP layer becomes one of these variants and
//! is rendered with the status code and body shape the web client expects.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

pub const PROVIDER_FAILED: &str = "OpenRouter API request failed";
pub const UNEXPECTED: &str = "Unexpected error";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The caller supplied no usable content.
    #[error("{0}")]
    InvalidInput(String),

    /// The request body exceeded the upload limit.
    #[error("{0}")]
    TooLarge(String),

    /// The completion API failed: transport error, timeout, non-2xx or an
    /// unusable response envelope.
    #[error("OpenRouter API request failed: {0}")]
    Provider(String),

    /// Start-up configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Text of a panic payload, for logs and the generic 500 body.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Provider(_) | AppError::Config(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::InvalidInput(msg) | AppError::TooLarge(msg) => {
                crate::logger::warn("server", &format!("Rejected submission: {}", msg));
                ErrorResponse {
                    error: msg,
                    details: None,
                }
            }
            AppError::Provider(details) => {
                crate::logger::error("server", &format!("Provider error: {}", details));
                ErrorResponse {
                    error: PROVIDER_FAILED.to_string(),
                    details: Some(details),
                }
            }
            AppError::Config(details) | AppError::Unexpected(details) => {
                crate::logger::error("server", &format!("Unexpected error: {}", details));
                ErrorResponse {
                    error: UNEXPECTED.to_string(),
                    details: Some(details),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
