use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Failure taxonomy shared by the slot store, the appointment store and the
/// booking coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unexpected store failure: {0}")]
    Unexpected(String),
}

impl SchedulingError {
    pub fn not_found(entity: &str) -> Self {
        SchedulingError::NotFound(entity.to_string())
    }

    pub fn conflict(reason: &str) -> Self {
        SchedulingError::Conflict(reason.to_string())
    }
}

impl From<sqlx::Error> for SchedulingError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => SchedulingError::not_found("Record"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                SchedulingError::conflict("slot already booked")
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                SchedulingError::not_found("Referenced record")
            }
            _ => SchedulingError::Unexpected(err.to_string()),
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::NotFound(entity) => AppError::NotFound(format!("{} not found", entity)),
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::Conflict(msg) => AppError::Conflict(msg),
            SchedulingError::InvalidTransition { from, to } => {
                AppError::Conflict(format!("Cannot transition appointment from {} to {}", from, to))
            }
            SchedulingError::Unexpected(detail) => {
                tracing::error!("Unexpected scheduling failure: {}", detail);
                AppError::Internal("Internal server error".to_string())
            }
        }
    }
}
