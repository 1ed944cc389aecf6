//! API error type with automatic HTTP status mapping.
//!
//! Validation failures are returned as a field-error object with 400; every
//! other failure uses the `{"error": "..."}` body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::ErrorResponse;
use crate::db::is_unique_violation;
use crate::validation::{FieldErrors, NON_FIELD_ERRORS};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request validation failed (400)
    #[error("validation failed")]
    Validation(FieldErrors),

    /// Missing or invalid credentials (401)
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Authenticated but not allowed to touch the resource (403)
    #[error("{0}")]
    Forbidden(&'static str),

    /// Resource not found (404)
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a 400 with a single message on one field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    /// A unique-constraint violation becomes a 400 on `field`; any other
    /// database error passes through unchanged.
    pub fn on_unique_violation(
        err: diesel::result::Error,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        if is_unique_violation(&err) {
            Self::field(field, message)
        } else {
            Self::Database(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            Self::Validation(errors) => return (status, Json(errors)).into_response(),
            Self::Unauthorized(message) | Self::Forbidden(message) => message.to_string(),
            Self::NotFound(resource) => format!("{} not found", resource),
            Self::Database(diesel::result::Error::NotFound) => "Not found".to_string(),
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                "An internal error occurred".to_string()
            }
            Self::Pool(e) => {
                tracing::error!(error = %e, "database connection failed");
                "Database connection failed".to_string()
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                "An internal error occurred".to_string()
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::field(NON_FIELD_ERRORS, rejection.body_text())
    }
}
