// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use super::projects::ensure_access;
use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::{CreateBugsRequest, CreateBugsResponse},
    state::AppState,
};

/// File a batch of 1 to 20 bugs against a project.
///
/// Access is checked before the body is looked at. Bug numbers continue
/// from the project's highest `BUG-<n>`; the batch is stored atomically.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/bugs",
    params(("id" = String, Path, description = "Project id")),
    request_body = CreateBugsRequest,
    tag = "Bugs",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = CreateBugsResponse),
        (status = 400, description = "Invalid batch"),
        (status = 403, description = "Caller has no access to the project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn create_bugs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<String>,
    payload: Result<Json<CreateBugsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateBugsResponse>), ApiError> {
    let project = state
        .store
        .find_project(&project_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to create bugs"))?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    ensure_access(&state, &project.id, &user.registration_id).await?;

    let Json(request) = payload?;
    let bugs = request.validate()?;

    let created = state
        .store
        .create_bugs(&project.id, &user.registration_id, bugs)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to create bugs"))?;

    tracing::info!(
        project_id = %project.id,
        count = created.len(),
        "Bugs created"
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}
