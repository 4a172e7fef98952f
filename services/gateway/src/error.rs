use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::notifier::EmitError;
use crate::protocol::ErrorPayload;
use crate::rate_limit::RateLimitExceeded;

/// Central error type for the gateway's HTTP surface
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "internal error while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}

impl From<EmitError> for AppError {
    fn from(err: EmitError) -> Self {
        match err {
            EmitError::Uninitialized => AppError::ServiceUnavailable(err.to_string()),
            EmitError::Encode { .. } => AppError::InternalError(anyhow::Error::new(err)),
        }
    }
}

/// Close code sent after a session is replaced or evicted
pub const CLOSE_EVICTED: u16 = 4000;

/// Handshake failures. Fatal to the connection attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication token is required")]
    NoToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Token does not match the claimed user")]
    IdentityMismatch,

    #[error("Account is suspended or inactive")]
    AccountInactive,

    #[error("User directory unavailable")]
    DirectoryUnavailable,

    #[error("Realtime service is not accepting connections")]
    NotAccepting,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NoToken => "NO_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::IdentityMismatch => "IDENTITY_MISMATCH",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::DirectoryUnavailable => "UPSTREAM_ERROR",
            AuthError::NotAccepting => "SERVICE_UNAVAILABLE",
        }
    }

    /// WebSocket close code for the rejected handshake
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::NoToken => 4001,
            AuthError::InvalidToken => 4002,
            AuthError::UserNotFound => 4003,
            AuthError::IdentityMismatch => 4004,
            AuthError::AccountInactive => 4005,
            // 1011: server hit an unexpected condition
            AuthError::DirectoryUnavailable => 1011,
            // 1013: try again later
            AuthError::NotAccepting => 1013,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.code(), self.to_string())
    }
}

/// Per-event failures. None of these close the connection; each one is
/// reported back to the caller as an `error` event.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("{0}")]
    Ownership(String),

    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error("Invalid `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("Event `{0}` is not available for this session")]
    UnknownEvent(String),

    #[error("Upstream service error")]
    Upstream(#[from] DirectoryError),

    #[error("Internal error")]
    Internal(String),
}

impl SocketError {
    pub fn ownership(message: impl Into<String>) -> Self {
        SocketError::Ownership(message.into())
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SocketError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SocketError::Ownership(_) => "PERMISSION_DENIED",
            SocketError::RateLimited(_) => "RATE_LIMITED",
            SocketError::Validation { .. } => "VALIDATION_ERROR",
            SocketError::UnknownEvent(_) => "UNKNOWN_EVENT",
            SocketError::Upstream(_) => "UPSTREAM_ERROR",
            SocketError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-safe payload. Upstream and internal details stay server-side.
    pub fn to_payload(&self) -> ErrorPayload {
        let payload = ErrorPayload::new(self.code(), self.to_string());
        match self {
            SocketError::Validation { field, .. } => payload.with_field(field),
            SocketError::RateLimited(exceeded) => {
                payload.with_rate_limit(exceeded.limit, exceeded.reset_at)
            }
            _ => payload,
        }
    }
}
