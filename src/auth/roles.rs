// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-based route access.
//!
//! Roles are free-form strings stored on the registration. A route declares
//! the roles it admits; matching is case-insensitive and an empty allow-list
//! means any authenticated caller. A missing identity is always denied.

use super::claims::UserContext;
use super::error::AuthError;

/// Roles allowed to create projects.
pub const PROJECT_MANAGER_ROLES: [&str; 2] = ["PM", "Project Manager"];

/// Case-insensitive exact match.
pub fn role_matches(actual: &str, wanted: &str) -> bool {
    actual == wanted || actual.to_lowercase() == wanted.to_lowercase()
}

/// Allow-list attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedRoles(Vec<String>);

impl AllowedRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    /// Empty allow-list: authentication alone is enough.
    pub fn any_authenticated() -> Self {
        Self::default()
    }

    pub fn project_managers() -> Self {
        Self::new(PROJECT_MANAGER_ROLES)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn permits(&self, role: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|allowed| role_matches(role, allowed))
    }
}

/// Whether `identity` may use a route guarded by `allowed`.
pub fn authorize(identity: Option<&UserContext>, allowed: &AllowedRoles) -> bool {
    identity.is_some_and(|user| allowed.permits(&user.role))
}

/// [`authorize`] with the rejection reason.
pub fn enforce(identity: Option<&UserContext>, allowed: &AllowedRoles) -> Result<(), AuthError> {
    let Some(user) = identity else {
        return Err(AuthError::AuthenticationRequired);
    };
    if allowed.permits(&user.role) {
        Ok(())
    } else {
        tracing::info!(
            registration_id = %user.registration_id,
            role = %user.role,
            "Role not permitted for route"
        );
        Err(AuthError::Forbidden {
            required: allowed.names().to_vec(),
        })
    }
}
