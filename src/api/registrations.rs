// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::ApiError,
    models::{CreateRegistrationRequest, Registration},
    state::AppState,
};

/// Register a user with the application.
///
/// Public: the caller may hold a Supabase account but has no registration
/// yet. The email links future tokens to this record.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = CreateRegistrationRequest,
    tag = "Registrations",
    responses(
        (status = 201, body = Registration),
        (status = 400, description = "Missing or invalid field"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CreateRegistrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let registration = state
        .store
        .create_registration(request)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to save registration"))?;

    tracing::info!(
        registration_id = %registration.id,
        role = %registration.role,
        "Registration created"
    );
    Ok((StatusCode::CREATED, Json(registration)))
}
