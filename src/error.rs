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

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Invitation expired")]
    InvitationExpired,

    #[error("Invitation already redeemed")]
    AlreadyRedeemed,

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Team version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::InvitationNotFound => (StatusCode::NOT_FOUND, "invitation_not_found", None),
            AppError::InvitationExpired => (StatusCode::GONE, "invitation_expired", None),
            AppError::AlreadyRedeemed => (StatusCode::CONFLICT, "already_redeemed", None),
            AppError::InvariantViolation(msg) => {
                // Should never be reachable from normal UI flow; log as a bug.
                tracing::error!(error = %msg, "Invariant violation");
                (
                    StatusCode::CONFLICT,
                    "invariant_violation",
                    Some(msg.clone()),
                )
            }
            AppError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, "permission_denied", Some(msg.clone()))
            }
            AppError::VersionConflict { .. } => (
                StatusCode::CONFLICT,
                "version_conflict",
                Some(self.to_string()),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// True for transient store failures where the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
