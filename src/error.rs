//! Error types for the LMS server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes carried in the JSON error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchLoan = 4,
    NoSuchCopies = 5,
    NoCopiesAvailable = 6,
    DuplicateLoan = 7,
    BadValue = 8,
    InsufficientCopies = 9,
    LedgerInconsistency = 10,
    NoSuchBorrower = 11,
    NoSuchCatalogRecord = 12,
}

/// Coarse failure taxonomy callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity absence
    NotFound,
    /// Business-rule violation
    Conflict,
    /// A ledger invariant was already broken before the call
    Inconsistency,
    /// I/O or transport error from the store
    StorageFailure,
    /// Caller is not allowed to perform the operation
    Access,
    /// Malformed request
    Invalid,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No copies record for book {book_id} at branch {branch_id}")]
    CopyRecordNotFound { book_id: i32, branch_id: i32 },

    #[error("No borrower with card {card_no}")]
    BorrowerNotFound { card_no: i32 },

    #[error("No book {book_id} or no branch {branch_id} in the catalog")]
    CatalogRecordNotFound { book_id: i32, branch_id: i32 },

    #[error("No loan of book {book_id} at branch {branch_id} for card {card_no}")]
    LoanNotFound {
        book_id: i32,
        branch_id: i32,
        card_no: i32,
    },

    #[error("No copies of book {book_id} available at branch {branch_id}")]
    NoCopiesAvailable { book_id: i32, branch_id: i32 },

    #[error("Card {card_no} already has book {book_id} checked out from branch {branch_id}")]
    DuplicateLoan {
        book_id: i32,
        branch_id: i32,
        card_no: i32,
    },

    #[error("Renewal date {requested} is not after current due date {current}")]
    InvalidRenewalDate {
        current: chrono::NaiveDate,
        requested: chrono::NaiveDate,
    },

    #[error("Due date {due_date} is not after checkout date {today}")]
    InvalidDueDate {
        today: chrono::NaiveDate,
        due_date: chrono::NaiveDate,
    },

    #[error("Cannot set {requested} copies while {outstanding} are on loan")]
    InsufficientCopies { requested: i32, outstanding: i32 },

    #[error("Ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::CopyRecordNotFound { .. }
            | AppError::BorrowerNotFound { .. }
            | AppError::CatalogRecordNotFound { .. }
            | AppError::LoanNotFound { .. } => ErrorKind::NotFound,
            AppError::NoCopiesAvailable { .. }
            | AppError::DuplicateLoan { .. }
            | AppError::InvalidRenewalDate { .. }
            | AppError::InvalidDueDate { .. }
            | AppError::InsufficientCopies { .. } => ErrorKind::Conflict,
            AppError::LedgerInconsistency(_) => ErrorKind::Inconsistency,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::StorageFailure,
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorKind::Access,
            AppError::BadRequest(_) => ErrorKind::Invalid,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            AppError::CopyRecordNotFound { .. } => ErrorCode::NoSuchCopies,
            AppError::LoanNotFound { .. } => ErrorCode::NoSuchLoan,
            AppError::BorrowerNotFound { .. } => ErrorCode::NoSuchBorrower,
            AppError::CatalogRecordNotFound { .. } => ErrorCode::NoSuchCatalogRecord,
            AppError::NoCopiesAvailable { .. } => ErrorCode::NoCopiesAvailable,
            AppError::DuplicateLoan { .. } => ErrorCode::DuplicateLoan,
            AppError::InvalidRenewalDate { .. }
            | AppError::InvalidDueDate { .. }
            | AppError::BadRequest(_) => ErrorCode::BadValue,
            AppError::InsufficientCopies { .. } => ErrorCode::InsufficientCopies,
            AppError::LedgerInconsistency(_) => ErrorCode::LedgerInconsistency,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorCode::NotAuthorized,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::LedgerInconsistency(msg) => {
                tracing::error!("Ledger inconsistency reported to caller: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => match self.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
                _ => (StatusCode::CONFLICT, self.to_string()),
            },
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_taxonomy() {
        assert_eq!(
            AppError::NoCopiesAvailable { book_id: 1, branch_id: 1 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::LoanNotFound { book_id: 1, branch_id: 1, card_no: 1 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::LedgerInconsistency("x".into()).kind(),
            ErrorKind::Inconsistency
        );
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::StorageFailure
        );
    }

    #[test]
    fn test_status_mapping() {
        let response = AppError::DuplicateLoan { book_id: 7, branch_id: 3, card_no: 42 }
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::CopyRecordNotFound { book_id: 7, branch_id: 3 }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::BorrowerNotFound { card_no: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::LedgerInconsistency("broken".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::Authorization("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
