// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive
//! `Serialize`, `Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation. Request types carry a `validate` method that handlers call
//! before touching the store.
//!
//! ## Model Categories
//!
//! - **Registrations**: application-level sign-up, one per email
//! - **Projects**: created by PMs, visible to creator and members
//! - **Bugs**: filed in batches against a project

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

/// Team keys a project may list.
pub const VALID_TEAMS: [&str; 5] = ["backend", "frontend", "mobile", "qa", "uiux"];

/// Accepted bug priorities.
pub const VALID_PRIORITIES: [&str; 4] = ["critical", "high", "medium", "low"];

/// Maximum bugs accepted in one request.
pub const MAX_BUGS_PER_REQUEST: usize = 20;

/// Status every new project starts in.
pub const INITIAL_PROJECT_STATUS: &str = "planning";

/// Status every new bug starts in.
pub const INITIAL_BUG_STATUS: &str = "open";

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::bad_request(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Blank optional strings are stored as NULL.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Registration Models
// =============================================================================

/// A registered user of the application.
///
/// Links a Supabase account (by email) to an internal id and a role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Registration {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub organisation_name: String,
    /// Free-form role, e.g. `PM`, `Developer`, `QA`.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRegistrationRequest {
    pub full_name: String,
    pub email: String,
    pub organisation_name: String,
    pub role: String,
}

impl CreateRegistrationRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("full_name", &self.full_name)?;
        require("email", &self.email)?;
        require("organisation_name", &self.organisation_name)?;
        require("role", &self.role)?;
        if !looks_like_email(&self.email) {
            return Err(ApiError::bad_request("email must be a valid email address"));
        }
        Ok(())
    }
}

/// Syntactic check only: `local@domain.tld` without whitespace.
fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.')
}

// =============================================================================
// Project Models
// =============================================================================

/// A project record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub project_name: String,
    pub description: String,
    pub icon: String,
    pub teams: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub status: String,
    /// Short human-readable id, e.g. `ECO-K1R2`.
    pub workspace_id: String,
    /// Registration id of the PM who created the project.
    pub created_by: String,
    pub progress: i32,
    pub member_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /projects`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub project_name: String,
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub start_date: Option<String>,
}

impl CreateProjectRequest {
    /// Check required fields and team keys, and parse the start date.
    pub fn validate(&self) -> Result<Option<NaiveDate>, ApiError> {
        require("project_name", &self.project_name)?;
        require("description", &self.description)?;

        if let Some(team) = self.teams.iter().find(|t| !VALID_TEAMS.contains(&t.as_str())) {
            return Err(ApiError::bad_request(format!(
                "Invalid team '{team}'. Must be one of: {}",
                VALID_TEAMS.join(", ")
            )));
        }

        match self.start_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ApiError::bad_request("Invalid start_date format. Use YYYY-MM-DD")),
        }
    }
}

/// Validated project ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub project_name: String,
    pub description: String,
    pub icon: String,
    pub teams: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub workspace_id: String,
    pub created_by: String,
}

// =============================================================================
// Bug Models
// =============================================================================

/// A bug filed against a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Bug {
    pub id: String,
    pub project_id: String,
    /// Sequential per project: `BUG-1`, `BUG-2`, ...
    pub bug_number: String,
    pub title: String,
    pub priority: String,
    pub description: Option<String>,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub status: String,
    pub created_by: String,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One bug in a `POST /projects/{id}/bugs` batch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBugRequest {
    pub title: String,
    /// One of `critical`, `high`, `medium`, `low`.
    pub priority: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<String>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Registration id of the assignee.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// Request body for `POST /projects/{id}/bugs`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBugsRequest {
    pub bugs: Vec<CreateBugRequest>,
}

/// Validated bug ready for insertion; the store assigns the number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBug {
    pub title: String,
    pub priority: String,
    pub description: Option<String>,
    pub steps: Vec<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub assigned_to: Option<String>,
}

impl CreateBugsRequest {
    pub fn validate(self) -> Result<Vec<NewBug>, ApiError> {
        if self.bugs.is_empty() || self.bugs.len() > MAX_BUGS_PER_REQUEST {
            return Err(ApiError::bad_request(format!(
                "bugs must contain between 1 and {MAX_BUGS_PER_REQUEST} entries"
            )));
        }
        self.bugs
            .into_iter()
            .enumerate()
            .map(|(i, bug)| bug.validate().map_err(|e| e.with_prefix(&format!("bugs[{i}]"))))
            .collect()
    }
}

impl CreateBugRequest {
    fn validate(self) -> Result<NewBug, ApiError> {
        require("title", &self.title)?;
        if !VALID_PRIORITIES.contains(&self.priority.as_str()) {
            return Err(ApiError::bad_request(format!(
                "priority must be one of: {}",
                VALID_PRIORITIES.join(", ")
            )));
        }

        let assigned_to = non_blank(self.assigned_to);
        if let Some(id) = &assigned_to {
            if Uuid::parse_str(id).is_err() {
                return Err(ApiError::bad_request("assigned_to must be a registration id"));
            }
        }

        Ok(NewBug {
            title: self.title,
            priority: self.priority,
            description: non_blank(self.description),
            steps: self.steps.unwrap_or_default(),
            version: non_blank(self.version),
            platform: non_blank(self.platform),
            assigned_to,
        })
    }
}

/// Response body for `POST /projects/{id}/bugs`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBugsResponse {
    pub bugs: Vec<Bug>,
    pub count: usize,
}

impl From<Vec<Bug>> for CreateBugsResponse {
    fn from(bugs: Vec<Bug>) -> Self {
        Self {
            count: bugs.len(),
            bugs,
        }
    }
}
