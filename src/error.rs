use std::io;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("Read of pin {pin} failed: {reason}")]
    PinRead { pin: u32, reason: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Log file error: {0}")]
    LogFile(#[from] io::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Gpio(_)
            | AppError::PinRead { .. }
            | AppError::LogFile(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
