//! Error types for the review API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use review_core::{IntakeError, SubmissionError, TransitionError};
use review_mailer::MailerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Review not found: {0}")]
    ReviewNotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Email error: {0}")]
    Mailer(#[from] MailerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Submission(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Intake(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            ApiError::ReviewNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Review not found: {}", id))
            }
            ApiError::Transition(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Mailer(MailerError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Mailer(MailerError::NotConfigured) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SendGrid API key not configured".to_string(),
            ),
            ApiError::Mailer(e) => {
                tracing::error!("Email provider error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send email".to_string(),
                )
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
