use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::adstxt::DomainError;
use crate::analyzer::{AnalysisError, BatchError};

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    RateLimited,
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                status_text(StatusCode::BAD_REQUEST),
                message,
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
                "Too many requests. Please try again later.".to_string(),
            ),
            AppError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                status_text(StatusCode::INTERNAL_SERVER_ERROR),
                message,
            ),
        };

        let body = Json(ErrorResponse {
            error,
            message: Some(message),
        });

        (status, body).into_response()
    }
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Error").to_string()
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::BadRequest(format!("invalid domain: {}", e))
    }
}

impl From<BatchError> for AppError {
    fn from(e: BatchError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        AppError::Internal(e.to_string())
    }
}
