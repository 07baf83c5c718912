// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Platform is in lockdown")]
    PlatformLockdown,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::AuthenticationFailed => "authentication_failed",
            AppError::Forbidden(_) => "forbidden",
            AppError::PlatformLockdown => "platform_lockdown",
            AppError::AccountDisabled => "account_disabled",
            AppError::Validation { .. } => "validation_failed",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Identity(_) => "identity_error",
            AppError::Storage(_) => "storage_error",
            AppError::Database(_) => "database_error",
            AppError::Inconsistent(_) => "inconsistent_state",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Report the first field alphabetically so responses are stable.
        let first = errors
            .field_errors()
            .into_iter()
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .or_else(|| errs.first().map(|e| e.code.to_string()))
                    .unwrap_or_else(|| "invalid".to_string());
                (field.to_string(), message)
            });

        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::BadRequest("Invalid request body".to_string()),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, details, field) = match &self {
            AppError::Unauthorized | AppError::InvalidToken | AppError::AuthenticationFailed => {
                (StatusCode::UNAUTHORIZED, None, None)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, Some(msg.clone()), None),
            AppError::PlatformLockdown => (
                StatusCode::FORBIDDEN,
                Some("The platform is temporarily locked down".to_string()),
                None,
            ),
            AppError::AccountDisabled => (
                StatusCode::FORBIDDEN,
                Some("This account has been disabled".to_string()),
                None,
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                Some(message.clone()),
                Some(field.clone()),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone()), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone()), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, Some(msg.clone()), None),
            AppError::Identity(msg) => {
                tracing::warn!(error = %msg, "Identity provider error");
                (StatusCode::BAD_GATEWAY, None, None)
            }
            AppError::Storage(msg) => {
                tracing::warn!(error = %msg, "Object storage error");
                (StatusCode::BAD_GATEWAY, None, None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
            AppError::Inconsistent(msg) => {
                tracing::error!(error = %msg, "Inconsistent state after partial failure");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
        };

        let body = ErrorResponse {
            error: code.to_string(),
            details,
            field,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
