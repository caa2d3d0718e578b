// Error handling module for the Loyalty API
// Provides centralized error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::analytics::error::AnalyticsError;

/// Main error type for the API
/// All handlers should return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Validation errors from request validation
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Malformed query parameters or request bodies
    /// Maps to HTTP 400 Bad Request
    BadRequest { message: String },

    /// Errors surfaced by the aggregation engine; status depends on
    /// the kind (invalid range 400, fetch failure 500, timeout 504)
    Analytics(AnalyticsError),

    /// Database operation errors
    /// Maps to HTTP 500 Internal Server Error
    /// Sensitive details are filtered from client responses
    DatabaseError(sqlx::Error),
}

/// Consistent error response structure
///
/// Machine-readable `error_code` plus a human-readable `message`;
/// optional `details` carry field-level validation errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse.
    ///
    /// Logging is tiered by severity: debug for expected client
    /// errors, warn for timeouts, error for fetch/database failures.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "VALIDATION_ERROR".to_string(),
                        message: "Request validation failed".to_string(),
                        details: Some(
                            serde_json::to_value(errors).unwrap_or(serde_json::json!({})),
                        ),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::BadRequest { message } => {
                debug!("Bad request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "BAD_REQUEST".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::Analytics(err) => Self::analytics_error_response(err),
            ApiError::DatabaseError(db_error) => {
                // Full error stays in the log, never in the response
                error!("Database error: {:?}", db_error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "DATABASE_ERROR".to_string(),
                        message: "A database error occurred".to_string(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
        }
    }

    fn analytics_error_response(err: &AnalyticsError) -> (StatusCode, ErrorResponse) {
        match err {
            AnalyticsError::InvalidRange { .. } => {
                debug!("Invalid range: {}", err);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "INVALID_RANGE".to_string(),
                        message: err.to_string(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            AnalyticsError::DataFetch { target, source } => {
                error!("Fetch of {} records failed: {}", target, source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "DATA_FETCH_ERROR".to_string(),
                        message: format!("Failed to fetch {} records", target),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            AnalyticsError::Timeout { target, budget_ms } => {
                warn!("Fetch of {} records timed out after {}ms", target, budget_ms);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    ErrorResponse {
                        error_code: "TIMEOUT".to_string(),
                        message: err.to_string(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Analytics(AnalyticsError::InvalidRange { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Analytics(AnalyticsError::DataFetch { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Analytics(AnalyticsError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert sqlx errors to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::DatabaseError(error)
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

/// Convert engine errors to ApiError unmodified
impl From<AnalyticsError> for ApiError {
    fn from(error: AnalyticsError) -> Self {
        ApiError::Analytics(error)
    }
}
