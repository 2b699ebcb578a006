// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::{CreateProjectRequest, NewProject, Project},
    state::AppState,
};

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.iter().rev().map(|&d| d as char).collect()
}

/// Short human-readable workspace id.
///
/// First three characters of the trimmed name, uppercased (`UNK` for an
/// empty name), then the last four base36 digits of `millis`:
/// `"E-Commerce"` → `E-C-3V28`.
pub fn generate_workspace_id(project_name: &str, millis: u64) -> String {
    let prefix: String = project_name.trim().chars().take(3).collect();
    let prefix = if prefix.is_empty() {
        "UNK".to_string()
    } else {
        prefix.to_uppercase()
    };

    let encoded = to_base36(millis);
    let suffix = &encoded[encoded.len().saturating_sub(4)..];
    format!("{prefix}-{suffix}")
}

/// Create a project. PM roles only.
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = CreateProjectRequest,
    tag = "Projects",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = Project),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not a PM")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let Json(request) = payload?;
    let start_date = request.validate()?;

    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let project = NewProject {
        workspace_id: generate_workspace_id(&request.project_name, millis),
        project_name: request.project_name,
        description: request.description,
        icon: request.icon.unwrap_or_default(),
        teams: request.teams,
        start_date,
        created_by: user.registration_id,
    };

    let project = state
        .store
        .create_project(project)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to create project"))?;

    tracing::info!(
        project_id = %project.id,
        workspace_id = %project.workspace_id,
        "Project created"
    );
    Ok((StatusCode::CREATED, Json(project)))
}

/// Projects the caller created or was assigned to.
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "Projects",
    security(("bearer_auth" = [])),
    responses((status = 200, body = [Project]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = state
        .store
        .list_projects_for(&user.registration_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch projects"))?;
    Ok(Json(projects))
}

/// Fetch one project. Creator or member only.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = String, Path, description = "Project id")),
    tag = "Projects",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = Project),
        (status = 403, description = "Caller has no access to the project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .store
        .find_project(&project_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch project"))?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    ensure_access(&state, &project.id, &user.registration_id).await?;
    Ok(Json(project))
}

/// 403 unless the registration created or is a member of the project.
pub(crate) async fn ensure_access(
    state: &AppState,
    project_id: &str,
    registration_id: &str,
) -> Result<(), ApiError> {
    let allowed = state
        .store
        .has_project_access(project_id, registration_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to verify project access"))?;
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have access to this project"))
    }
}
