// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Postgres persistence via SQLx.
//!
//! Every public operation is wrapped in a per-operation timeout
//! ([`DEFAULT_OPERATION_TIMEOUT`]) and surfaces [`StoreError::Timeout`]
//! instead of hanging. Ids are UUIDs in the database and strings in the API;
//! a string that is not a UUID simply matches nothing.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{bug_number, StoreError, StoreResult, TaskStore};
use crate::auth::{IdentityStore, StoredIdentity};
use crate::models::{
    Bug, CreateRegistrationRequest, NewBug, NewProject, Project, Registration,
    INITIAL_BUG_STATUS, INITIAL_PROJECT_STATUS,
};

/// Upper bound on a single store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const PROJECT_COLUMNS: &str = "id, project_name, description, icon, teams, start_date, status, \
     workspace_id, created_by, progress, member_count, created_at, updated_at";

const BUG_COLUMNS: &str = "id, project_id, bug_number, title, priority, description, steps, \
     version, platform, status, created_by, assigned_to, created_at, updated_at";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout("connection acquire"),
            sqlx::Error::RowNotFound => StoreError::NotFound("Row"),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => StoreError::Conflict(match db.constraint() {
                    Some("registrations_email_key") => {
                        "A registration with this email already exists".to_string()
                    }
                    _ => "Record already exists".to_string(),
                }),
                Some(FOREIGN_KEY_VIOLATION) => StoreError::InvalidReference(
                    "Referenced registration or project does not exist".to_string(),
                ),
                _ => StoreError::Unavailable(err.to_string()),
            },
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Postgres-backed [`TaskStore`] and [`IdentityStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl PgStore {
    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(DEFAULT_OPERATION_TIMEOUT)
            .connect(database_url)
            .await?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            op_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Apply the bundled migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn timed<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(operation)),
        }
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn parse_reference(raw: &str, what: &str) -> StoreResult<Uuid> {
    parse_id(raw).ok_or_else(|| StoreError::InvalidReference(format!("{what} is not a valid id")))
}

#[async_trait]
impl TaskStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        self.timed("ping", async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, sqlx::Error>(())
        })
        .await
    }

    async fn create_registration(
        &self,
        request: CreateRegistrationRequest,
    ) -> StoreResult<Registration> {
        let row = self
            .timed(
                "create registration",
                sqlx::query_as::<_, RegistrationRow>(
                    "INSERT INTO registrations (full_name, email, organisation_name, role)
                     VALUES ($1, $2, $3, $4)
                     RETURNING id, full_name, email, organisation_name, role, created_at",
                )
                .bind(&request.full_name)
                .bind(&request.email)
                .bind(&request.organisation_name)
                .bind(&request.role)
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into_record())
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let created_by = parse_reference(&project.created_by, "created_by")?;
        let sql = format!(
            "INSERT INTO projects
                 (project_name, description, icon, teams, start_date, status, workspace_id, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PROJECT_COLUMNS}"
        );
        let row = self
            .timed(
                "create project",
                sqlx::query_as::<_, ProjectRow>(&sql)
                    .bind(&project.project_name)
                    .bind(&project.description)
                    .bind(&project.icon)
                    .bind(&project.teams)
                    .bind(project.start_date)
                    .bind(INITIAL_PROJECT_STATUS)
                    .bind(&project.workspace_id)
                    .bind(created_by)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into_record())
    }

    async fn list_projects_for(&self, registration_id: &str) -> StoreResult<Vec<Project>> {
        let Some(registration_id) = parse_id(registration_id) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE created_by = $1
                OR id IN (SELECT project_id FROM project_members WHERE user_id = $1)
             ORDER BY created_at DESC"
        );
        let rows = self
            .timed(
                "list projects",
                sqlx::query_as::<_, ProjectRow>(&sql)
                    .bind(registration_id)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(ProjectRow::into_record).collect())
    }

    async fn find_project(&self, project_id: &str) -> StoreResult<Option<Project>> {
        let Some(project_id) = parse_id(project_id) else {
            return Ok(None);
        };
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        let row = self
            .timed(
                "find project",
                sqlx::query_as::<_, ProjectRow>(&sql)
                    .bind(project_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(ProjectRow::into_record))
    }

    async fn has_project_access(
        &self,
        project_id: &str,
        registration_id: &str,
    ) -> StoreResult<bool> {
        let (Some(project_id), Some(registration_id)) =
            (parse_id(project_id), parse_id(registration_id))
        else {
            return Ok(false);
        };
        self.timed(
            "check project access",
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(
                     SELECT 1 FROM projects WHERE id = $1 AND created_by = $2
                     UNION
                     SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2
                 )",
            )
            .bind(project_id)
            .bind(registration_id)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn create_bugs(
        &self,
        project_id: &str,
        created_by: &str,
        bugs: Vec<NewBug>,
    ) -> StoreResult<Vec<Bug>> {
        let project_id = parse_id(project_id).ok_or(StoreError::NotFound("Project"))?;
        let created_by = parse_reference(created_by, "created_by")?;
        let assignees = bugs
            .iter()
            .map(|b| {
                b.assigned_to
                    .as_deref()
                    .map(|id| parse_reference(id, "assigned_to"))
                    .transpose()
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let insert = format!(
            "INSERT INTO bugs
                 (project_id, bug_number, title, priority, description, steps,
                  version, platform, status, created_by, assigned_to)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {BUG_COLUMNS}"
        );

        let rows = self
            .timed("create bugs", async {
                let mut tx = self.pool.begin().await?;

                // Row lock on the project serialises numbering across batches.
                sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
                    .bind(project_id)
                    .fetch_one(&mut *tx)
                    .await?;

                let current_max: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(CAST(SUBSTRING(bug_number FROM 5) AS BIGINT)), 0)
                     FROM bugs WHERE project_id = $1",
                )
                .bind(project_id)
                .fetch_one(&mut *tx)
                .await?;

                let mut rows = Vec::with_capacity(bugs.len());
                for ((bug, assignee), offset) in bugs.iter().zip(&assignees).zip(1i64..) {
                    let row = sqlx::query_as::<_, BugRow>(&insert)
                        .bind(project_id)
                        .bind(bug_number(current_max + offset))
                        .bind(&bug.title)
                        .bind(&bug.priority)
                        .bind(&bug.description)
                        .bind(&bug.steps)
                        .bind(&bug.version)
                        .bind(&bug.platform)
                        .bind(INITIAL_BUG_STATUS)
                        .bind(created_by)
                        .bind(*assignee)
                        .fetch_one(&mut *tx)
                        .await?;
                    rows.push(row);
                }

                tx.commit().await?;
                Ok::<_, sqlx::Error>(rows)
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => StoreError::NotFound("Project"),
                other => other,
            })?;

        Ok(rows.into_iter().map(BugRow::into_record).collect())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<StoredIdentity>> {
        let row = self
            .timed(
                "identity lookup",
                sqlx::query_as::<_, IdentityRow>(
                    "SELECT id, role FROM registrations WHERE email = $1",
                )
                .bind(email)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(|r| StoredIdentity {
            id: r.id.to_string(),
            role: r.role,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    role: String,
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    full_name: String,
    email: String,
    organisation_name: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl RegistrationRow {
    fn into_record(self) -> Registration {
        Registration {
            id: self.id.to_string(),
            full_name: self.full_name,
            email: self.email,
            organisation_name: self.organisation_name,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    project_name: String,
    description: String,
    icon: String,
    teams: Vec<String>,
    start_date: Option<NaiveDate>,
    status: String,
    workspace_id: String,
    created_by: Uuid,
    progress: i32,
    member_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    fn into_record(self) -> Project {
        Project {
            id: self.id.to_string(),
            project_name: self.project_name,
            description: self.description,
            icon: self.icon,
            teams: self.teams,
            start_date: self.start_date,
            status: self.status,
            workspace_id: self.workspace_id,
            created_by: self.created_by.to_string(),
            progress: self.progress,
            member_count: self.member_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BugRow {
    id: Uuid,
    project_id: Uuid,
    bug_number: String,
    title: String,
    priority: String,
    description: Option<String>,
    steps: Vec<String>,
    version: Option<String>,
    platform: Option<String>,
    status: String,
    created_by: Uuid,
    assigned_to: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BugRow {
    fn into_record(self) -> Bug {
        Bug {
            id: self.id.to_string(),
            project_id: self.project_id.to_string(),
            bug_number: self.bug_number,
            title: self.title,
            priority: self.priority,
            description: self.description,
            steps: self.steps,
            version: self.version,
            platform: self.platform,
            status: self.status,
            created_by: self.created_by.to_string(),
            assigned_to: self.assigned_to.map(|id| id.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
