//! Error types for the Visitdesk server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::ticket::TicketRejection;

/// Stable numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    BadValue = 2,
    NoSuchData = 3,
    InvalidTicketState = 4,
    Duplicate = 5,
    StoreFailure = 6,
    Unavailable = 7,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid ticket state: {0}")]
    InvalidState(TicketRejection),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store failure: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    /// Re-label a failure that happened while issuing the ticket of one help
    /// request, so the caller can tell which request broke the batch.
    pub fn for_help_request(self, help_request_id: i32) -> Self {
        match self {
            AppError::Conflict(msg) => {
                AppError::Conflict(format!("help request {}: {}", help_request_id, msg))
            }
            AppError::Database(e) => {
                tracing::error!(help_request_id, "Ticket issuance failed: {:?}", e);
                AppError::Store(format!(
                    "Failed to issue ticket for help request {}",
                    help_request_id
                ))
            }
            AppError::Store(msg) => {
                AppError::Store(format!("help request {}: {}", help_request_id, msg))
            }
            other => other,
        }
    }

    /// Map a unique-constraint violation to `Conflict`, keep everything else
    pub fn from_insert(e: sqlx::Error, what: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Conflict(format!("{} already exists", what))
            }
            _ => AppError::Database(e),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Machine-readable rejection reason for ticket state errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut reason = None;
        let (status, code, message) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::InvalidState(rejection) => {
                reason = Some(rejection.code().to_string());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorCode::InvalidTicketState,
                    rejection.to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::Store(msg) => {
                tracing::error!("Store failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::StoreFailure, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::StoreFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Unavailable, msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            reason,
        });

        (status, body).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("bad date".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("ticket".into()), StatusCode::NOT_FOUND),
            (
                AppError::InvalidState(TicketRejection::AlreadyUsed),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::Store("tx".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Unavailable("db".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_value() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        let request = Request::builder()
            .method("POST")
            .body(Body::from("{}"))
            .unwrap();
        // No content type
        let err: AppError = Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_for_help_request_names_request() {
        let err = AppError::Conflict("ticket number already exists".into()).for_help_request(17);
        assert!(err.to_string().contains("help request 17"));

        let err = AppError::Database(sqlx::Error::RowNotFound).for_help_request(3);
        match err {
            AppError::Store(msg) => assert!(msg.contains("help request 3")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
