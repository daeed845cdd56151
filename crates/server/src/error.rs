//! Unified error handling for the HTTP surface.
//!
//! Every caller-visible failure is one of five kinds, rendered as
//! `{ "error": { "code": "...", "message": "..." } }`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required request field is missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced member, household or chore does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The presented token or credential does not grant access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No usable credential was presented.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A downstream store or identity failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wire code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid-argument",
            Self::NotFound(_) => "not-found",
            Self::PermissionDenied(_) => "permission-denied",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error kind.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::InvalidArgument(msg)
            | Self::NotFound(msg)
            | Self::PermissionDenied(msg)
            | Self::Unauthenticated(msg) => msg.clone(),
        };

        let body = json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
