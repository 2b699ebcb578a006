// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{bug_number, bug_sequence, StoreError, StoreResult, TaskStore};
use crate::auth::{IdentityStore, StoredIdentity};
use crate::models::{
    Bug, CreateRegistrationRequest, NewBug, NewProject, Project, Registration,
    INITIAL_BUG_STATUS, INITIAL_PROJECT_STATUS,
};

#[derive(Default)]
struct Tables {
    registrations: HashMap<String, Registration>,
    projects: HashMap<String, Project>,
    /// (project_id, registration_id)
    members: HashSet<(String, String)>,
    bugs: Vec<Bug>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a registration to a project.
    pub async fn add_member(&self, project_id: &str, registration_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.registrations.contains_key(registration_id) {
            return Err(StoreError::InvalidReference(
                "member is not a registration".to_string(),
            ));
        }
        if !tables.projects.contains_key(project_id) {
            return Err(StoreError::NotFound("Project"));
        }
        let added = tables
            .members
            .insert((project_id.to_string(), registration_id.to_string()));
        if let Some(project) = tables.projects.get_mut(project_id).filter(|_| added) {
            project.member_count += 1;
        }
        Ok(())
    }

    /// Change a registration's role.
    pub async fn set_role(&self, registration_id: &str, role: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let registration = tables
            .registrations
            .get_mut(registration_id)
            .ok_or(StoreError::NotFound("Registration"))?;
        registration.role = role.to_string();
        Ok(())
    }
}

impl Tables {
    fn has_access(&self, project_id: &str, registration_id: &str) -> bool {
        self.projects
            .get(project_id)
            .is_some_and(|p| p.created_by == registration_id)
            || self
                .members
                .contains(&(project_id.to_string(), registration_id.to_string()))
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_registration(
        &self,
        request: CreateRegistrationRequest,
    ) -> StoreResult<Registration> {
        let mut tables = self.tables.write().await;
        if tables
            .registrations
            .values()
            .any(|r| r.email == request.email)
        {
            return Err(StoreError::Conflict(
                "A registration with this email already exists".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let registration = Registration {
            id: id.clone(),
            full_name: request.full_name,
            email: request.email,
            organisation_name: request.organisation_name,
            role: request.role,
            created_at: Utc::now(),
        };
        tables.registrations.insert(id, registration.clone());
        Ok(registration)
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        if !tables.registrations.contains_key(&project.created_by) {
            return Err(StoreError::InvalidReference(
                "creator is not a registration".to_string(),
            ));
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let record = Project {
            id: id.clone(),
            project_name: project.project_name,
            description: project.description,
            icon: project.icon,
            teams: project.teams,
            start_date: project.start_date,
            status: INITIAL_PROJECT_STATUS.to_string(),
            workspace_id: project.workspace_id,
            created_by: project.created_by,
            progress: 0,
            member_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(id, record.clone());
        Ok(record)
    }

    async fn list_projects_for(&self, registration_id: &str) -> StoreResult<Vec<Project>> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .values()
            .filter(|p| tables.has_access(&p.id, registration_id))
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn find_project(&self, project_id: &str) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(project_id).cloned())
    }

    async fn has_project_access(
        &self,
        project_id: &str,
        registration_id: &str,
    ) -> StoreResult<bool> {
        Ok(self.tables.read().await.has_access(project_id, registration_id))
    }

    async fn create_bugs(
        &self,
        project_id: &str,
        created_by: &str,
        bugs: Vec<NewBug>,
    ) -> StoreResult<Vec<Bug>> {
        // Single write guard for the whole batch: numbering and insertion
        // happen atomically with respect to other batches.
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(project_id) {
            return Err(StoreError::NotFound("Project"));
        }
        if let Some(assignee) = bugs
            .iter()
            .filter_map(|b| b.assigned_to.as_deref())
            .find(|id| !tables.registrations.contains_key(*id))
        {
            return Err(StoreError::InvalidReference(format!(
                "assigned_to {assignee} is not a registration"
            )));
        }

        let current_max = tables
            .bugs
            .iter()
            .filter(|b| b.project_id == project_id)
            .map(|b| bug_sequence(&b.bug_number))
            .max()
            .unwrap_or(0);

        let now = Utc::now();
        let created: Vec<Bug> = bugs
            .into_iter()
            .zip(1..)
            .map(|(bug, offset)| Bug {
                id: Uuid::new_v4().to_string(),
                project_id: project_id.to_string(),
                bug_number: bug_number(current_max + offset),
                title: bug.title,
                priority: bug.priority,
                description: bug.description,
                steps: bug.steps,
                version: bug.version,
                platform: bug.platform,
                status: INITIAL_BUG_STATUS.to_string(),
                created_by: created_by.to_string(),
                assigned_to: bug.assigned_to,
                created_at: now,
                updated_at: now,
            })
            .collect();

        tables.bugs.extend(created.iter().cloned());
        Ok(created)
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<StoredIdentity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .registrations
            .values()
            .find(|r| r.email == email)
            .map(|r| StoredIdentity {
                id: r.id.clone(),
                role: r.role.clone(),
            }))
    }
}
