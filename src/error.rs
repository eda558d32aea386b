//!
//! # Application error type
//!
//! `AppError` is the single error type used by every handler. It implements
//! `actix_web::error::ResponseError`, so handlers can return
//! `Result<_, AppError>` and have failures rendered as JSON automatically.
//!
//! The wire shape is `{"message": ..}` with an optional `"field"` key when a
//! validation failure can be attributed to a single input field. `From`
//! implementations cover the fallible crates used throughout (`sqlx`,
//! `validator`, `jsonwebtoken`, `bcrypt`) so `?` works at call sites.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// All error conditions the server can surface to a client.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed, or expired credentials (HTTP 401).
    Unauthorized(String),
    /// Authenticated but not allowed to touch the resource (HTTP 403).
    Forbidden(String),
    /// Malformed or otherwise unacceptable request (HTTP 400).
    BadRequest(String),
    /// The request conflicts with existing state, e.g. a taken email (HTTP 409).
    Conflict(String),
    /// The resource does not exist, or is owned by someone else (HTTP 404).
    NotFound(String),
    /// Input validation failed; `field` names the offending input when known (HTTP 400).
    Validation {
        message: String,
        field: Option<String>,
    },
    /// A database operation failed (HTTP 500).
    Database(String),
    /// Any other unexpected server fault (HTTP 500).
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Validation { message, .. } => write!(f, "Validation Error: {}", message),
            AppError::Database(msg) => write!(f, "Database Error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation {
                message,
                field: Some(field),
            } => json!({ "message": message, "field": field }),
            AppError::Validation { message, .. } => json!({ "message": message }),
            // Database details never reach the client.
            AppError::Database(_) => json!({ "message": "Internal server error" }),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => json!({ "message": msg }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::Database(error.to_string()),
        }
    }
}

/// Keeps the first offending field so the client can highlight the input.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let field = errors.field_errors().keys().next().map(|k| k.to_string());
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .next()
            .unwrap_or_else(|| errors.to_string());
        AppError::Validation { message, field }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Internal(error.to_string())
    }
}
