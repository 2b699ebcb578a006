// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::Request,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_auth, require_roles, AllowedRoles},
    models::{
        Bug, CreateBugRequest, CreateBugsRequest, CreateBugsResponse, CreateProjectRequest,
        CreateRegistrationRequest, Project, Registration,
    },
    state::AppState,
};

pub mod bugs;
pub mod health;
pub mod projects;
pub mod registrations;
pub mod users;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/register", post(registrations::register));

    let pm_only = from_fn_with_state(AllowedRoles::project_managers(), require_roles);
    let authenticated = Router::new()
        .route("/me", get(users::get_current_user))
        .route(
            "/projects",
            get(projects::list_projects)
                .merge(post(projects::create_project).route_layer(pm_only)),
        )
        .route("/projects/{id}", get(projects::get_project))
        .route("/projects/{id}/bugs", post(bugs::create_bugs))
        .route_layer(from_fn_with_state(state.auth.clone(), require_auth));

    let v1_routes = public.merge(authenticated).with_state(state);

    Router::new()
        .nest("/api/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Adds the bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Supabase access token"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        registrations::register,
        users::get_current_user,
        projects::list_projects,
        projects::create_project,
        projects::get_project,
        bugs::create_bugs
    ),
    components(
        schemas(
            health::HealthResponse,
            users::UserMeResponse,
            Registration,
            CreateRegistrationRequest,
            Project,
            CreateProjectRequest,
            Bug,
            CreateBugRequest,
            CreateBugsRequest,
            CreateBugsResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Registrations", description = "Application sign-up"),
        (name = "Users", description = "Current user"),
        (name = "Projects", description = "Project management"),
        (name = "Bugs", description = "Bug intake")
    )
)]
pub struct ApiDoc;
