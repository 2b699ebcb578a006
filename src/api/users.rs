// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, UserContext};

/// Response for GET /api/v1/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Supabase user id
    pub user_id: String,
    pub email: String,
    /// Internal registration id
    pub registration_id: String,
    pub role: String,
}

impl From<UserContext> for UserMeResponse {
    fn from(user: UserContext) -> Self {
        Self {
            user_id: user.subject_id,
            email: user.email,
            registration_id: user.registration_id,
            role: user.role,
        }
    }
}

/// Get the current authenticated user's information.
///
/// Returns the identity resolved from the bearer token and the
/// registrations table.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Missing, invalid or unregistered token"),
    )
)]
pub async fn get_current_user(CurrentUser(user): CurrentUser) -> Json<UserMeResponse> {
    Json(user.into())
}
