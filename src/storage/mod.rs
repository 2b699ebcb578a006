// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for registrations, projects, project membership and bugs.
//!
//! ## Backends
//!
//! - [`PgStore`]: Postgres through `sqlx`, every operation bounded by a
//!   5-second timeout. Used by the server binary.
//! - [`InMemoryStore`]: `HashMap`s behind a lock. Used by tests and local
//!   experiments; same semantics, no durability.
//!
//! Both implement [`TaskStore`] for the business routes and
//! [`IdentityStore`](crate::auth::IdentityStore) for the auth layer.
//!
//! ## Schema
//!
//! ```text
//! registrations    (id, full_name, email UNIQUE, organisation_name, role, created_at)
//! projects         (id, project_name, ..., workspace_id, created_by -> registrations)
//! project_members  (project_id -> projects, user_id -> registrations)
//! bugs             (id, project_id -> projects, bug_number UNIQUE per project, ...)
//! ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{Bug, CreateRegistrationRequest, NewBug, NewProject, Project, Registration};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Operation exceeded its time bound
    #[error("{0} timed out")]
    Timeout(&'static str),
    /// Target row does not exist
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Unique constraint violated
    #[error("{0}")]
    Conflict(String),
    /// Foreign key points nowhere
    #[error("{0}")]
    InvalidReference(String),
    /// Connection or query failure
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Business persistence used by the API handlers.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Cheap connectivity check for `/health`.
    async fn ping(&self) -> StoreResult<()>;

    /// Insert a registration. Duplicate email is [`StoreError::Conflict`].
    async fn create_registration(
        &self,
        request: CreateRegistrationRequest,
    ) -> StoreResult<Registration>;

    async fn create_project(&self, project: NewProject) -> StoreResult<Project>;

    /// Projects the registration created or is a member of, newest first.
    async fn list_projects_for(&self, registration_id: &str) -> StoreResult<Vec<Project>>;

    async fn find_project(&self, project_id: &str) -> StoreResult<Option<Project>>;

    /// Creator or member.
    async fn has_project_access(&self, project_id: &str, registration_id: &str)
        -> StoreResult<bool>;

    /// Insert a batch of bugs, numbered after the project's current highest
    /// `BUG-<n>`. All or nothing.
    async fn create_bugs(
        &self,
        project_id: &str,
        created_by: &str,
        bugs: Vec<NewBug>,
    ) -> StoreResult<Vec<Bug>>;
}

/// `BUG-<n>` → `n`. Anything else counts as zero.
pub(crate) fn bug_sequence(bug_number: &str) -> i64 {
    bug_number
        .strip_prefix("BUG-")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub(crate) fn bug_number(sequence: i64) -> String {
    format!("BUG-{sequence}")
}
