use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GestureError {
    #[error("Line not found: {0}")]
    NotFoundLine(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Provisioning error: {0}")]
    Provisioning(String),
    #[error("Line open error: {0}")]
    LineOpen(String),
    #[error("Read error: {0}")]
    Read(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Session error: {0}")]
    Session(String),
}

impl ResponseError for GestureError {
    fn status_code(&self) -> StatusCode {
        match self {
            GestureError::NotFoundLine(_) => StatusCode::NOT_FOUND,
            GestureError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            GestureError::Config(_)
            | GestureError::Provisioning(_)
            | GestureError::LineOpen(_)
            | GestureError::Read(_)
            | GestureError::Protocol(_)
            | GestureError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
