// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StoreError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Prefix the message, e.g. with the offending field path.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }

    /// Map a store failure, logging the detail and returning `public` for
    /// anything the caller cannot act on.
    pub fn from_store(err: StoreError, public: &str) -> Self {
        match err {
            StoreError::NotFound(what) => Self::not_found(format!("{what} not found")),
            StoreError::Conflict(msg) => Self::conflict(msg),
            StoreError::InvalidReference(msg) => Self::bad_request(msg),
            StoreError::Timeout(op) => {
                tracing::error!(operation = op, "Database operation timed out");
                Self::service_unavailable(public)
            }
            StoreError::Unavailable(detail) => {
                tracing::error!(error = %detail, "Database operation failed");
                Self::internal(public)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let conflict = ApiError::conflict("dup");
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let forbidden = ApiError::forbidden("no");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let dup = ApiError::from_store(StoreError::Conflict("taken".into()), "x");
        assert_eq!(dup.status, StatusCode::CONFLICT);
        assert_eq!(dup.message, "taken");

        let slow = ApiError::from_store(StoreError::Timeout("insert"), "Failed to save");
        assert_eq!(slow.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(slow.message, "Failed to save");

        let down = ApiError::from_store(
            StoreError::Unavailable("connection reset by peer".into()),
            "Failed to save",
        );
        assert_eq!(down.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(down.message, "Failed to save");

        let gone = ApiError::from_store(StoreError::NotFound("Project"), "x");
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
        assert_eq!(gone.message, "Project not found");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
