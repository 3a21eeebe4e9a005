//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 2,
    NoSuchData = 3,
    BadValue = 4,
    NoCopiesAvailable = 5,
    NoActiveLoan = 6,
    AlreadyReturned = 7,
    AlreadyOverdue = 8,
    InvalidDuration = 9,
    ConsistencyViolation = 10,
    NotificationFailure = 11,
    Conflict = 12,
}

/// Lending rule violations raised by the inventory ledger, the loan
/// state machine and the notification dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("No copies available for item {item_id}")]
    NoCopiesAvailable { item_id: i32 },

    #[error("No active loan for item {item_id} and member {member_id}")]
    NoActiveLoan { item_id: i32, member_id: i32 },

    #[error("Loan {loan_id} is already returned")]
    AlreadyReturned { loan_id: i32 },

    #[error("Loan {loan_id} is overdue since {due_date}")]
    AlreadyOverdue { loan_id: i32, due_date: NaiveDate },

    #[error("Invalid duration: {days} days (must be positive)")]
    InvalidDuration { days: i64 },

    #[error("Item {item_id} would exceed its capacity of {total_copies} copies")]
    ConsistencyViolation { item_id: i32, total_copies: i32 },

    #[error("Notification for loan {loan_id} could not be delivered: {reason}")]
    NotificationDelivery { loan_id: i32, reason: String },
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Lending(#[from] LendingError),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl LendingError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            LendingError::NoCopiesAvailable { .. } => {
                (StatusCode::CONFLICT, ErrorCode::NoCopiesAvailable)
            }
            LendingError::NoActiveLoan { .. } => (StatusCode::NOT_FOUND, ErrorCode::NoActiveLoan),
            LendingError::AlreadyReturned { .. } => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyReturned)
            }
            LendingError::AlreadyOverdue { .. } => (StatusCode::CONFLICT, ErrorCode::AlreadyOverdue),
            LendingError::InvalidDuration { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidDuration)
            }
            LendingError::ConsistencyViolation { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::ConsistencyViolation,
            ),
            LendingError::NotificationDelivery { .. } => {
                (StatusCode::BAD_GATEWAY, ErrorCode::NotificationFailure)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Conflict, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::Lending(e) => {
                let (status, code) = e.status_and_code();
                (status, code, e.to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The lending rule violation carried by this error, if any
    pub fn as_lending(&self) -> Option<&LendingError> {
        match self {
            AppError::Lending(e) => Some(e),
            _ => None,
        }
    }
}
