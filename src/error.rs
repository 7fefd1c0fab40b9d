//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing or invalid merchant credentials
/// - **Resource Errors**: Requested resources not found
/// - **Business Logic Errors**: Operations that violate business rules
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Merchant credentials are missing, malformed, or do not match.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid merchant credentials")]
    Unauthorized,

    /// A referenced entity (merchant account, customer, card, transaction)
    /// does not exist.
    ///
    /// Returns HTTP 404 Not Found. The String carries the lookup context,
    /// e.g. "Transaction was not found".
    #[error("{0}")]
    NotFound(String),

    /// The funding balance does not cover the requested amount.
    ///
    /// Raised during payment initiation when the card (top-up) or the
    /// merchant account (payout) is debited. Settlement only credits and
    /// can never hit this.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Not enough money on balance")]
    InsufficientFunds,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Errors raised by balance ledger operations.
///
/// The ledger is used from two places with different error surfaces: payment
/// initiation (HTTP, converts to [`AppError`]) and the settlement store
/// adapter (background job, converts to `StoreError`). Keeping its own enum
/// avoids tying balance arithmetic to either caller.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A debit would take the balance below zero. The balance is left
    /// unchanged.
    #[error("Not enough money on balance")]
    InsufficientFunds,

    /// The account or card targeted by the operation does not exist.
    #[error("{0} {1} was not found")]
    EntityNotFound(&'static str, Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds => AppError::InsufficientFunds,
            LedgerError::EntityNotFound(kind, id) => {
                AppError::NotFound(format!("{kind} {id} was not found"))
            }
            LedgerError::Database(e) => AppError::Database(e),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Unauthorized` → 401 Unauthorized
/// - `NotFound` → 404 Not Found
/// - `InsufficientFunds` → 422 Unprocessable Entity
/// - `InvalidRequest` → 400 Bad Request
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::InsufficientFunds => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}
