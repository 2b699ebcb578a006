// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! The variants carry the specific failure reason for server-side logs, but
//! the HTTP response never exposes it: every bad-token case collapses into
//! the same `invalid_token` body so callers cannot tell failures apart.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingToken,
    /// Authorization header is not `Bearer <token>`
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// Route requires an identity but none was attached to the request
    #[error("Authentication required")]
    AuthenticationRequired,
    /// Malformed, badly signed, expired or algorithm-mismatched token
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    /// Asymmetric token references a key id absent from a fresh key set
    #[error("No verification key for kid '{0}'")]
    KeyNotFound(String),
    /// Valid token, but no registration matches the email claim
    #[error("User not registered")]
    UserNotRegistered,
    /// Caller's role is not in the route's allow-list
    #[error("Insufficient permissions. Required role: {}", .required.join(" or "))]
    Forbidden { required: Vec<String> },
    /// Key discovery or the backing store failed
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Key discovery or the backing store did not answer in time
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(&'static str),
    /// Internal invariant broken (e.g. identity attached twice)
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        AuthError::InvalidToken(reason.into())
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::AuthenticationRequired => "authentication_required",
            AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_)
            | AuthError::KeyNotFound(_) => "invalid_token",
            AuthError::UserNotRegistered => "user_not_registered",
            AuthError::Forbidden { .. } => "forbidden",
            AuthError::UpstreamUnavailable(_) | AuthError::UpstreamTimeout(_) => {
                "service_unavailable"
            }
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::AuthenticationRequired
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_)
            | AuthError::KeyNotFound(_)
            | AuthError::UserNotRegistered => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::UpstreamUnavailable(_) | AuthError::UpstreamTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::MissingToken | AuthError::InvalidAuthHeader => {
                "Missing or invalid authorization header".to_string()
            }
            AuthError::InvalidToken(_) | AuthError::KeyNotFound(_) => {
                "Invalid or expired token".to_string()
            }
            AuthError::AuthenticationRequired => "Authentication required".to_string(),
            AuthError::UserNotRegistered => "User not registered".to_string(),
            AuthError::Forbidden { .. } => self.to_string(),
            AuthError::UpstreamUnavailable(_) | AuthError::UpstreamTimeout(_) => {
                "Service temporarily unavailable".to_string()
            }
            AuthError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::UpstreamUnavailable(_)
            | AuthError::UpstreamTimeout(_)
            | AuthError::Internal(_) => {
                tracing::error!(error = %self, "Authentication aborted by infrastructure failure");
            }
            _ => tracing::debug!(error = %self, "Request rejected by auth layer"),
        }

        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
