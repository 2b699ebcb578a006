// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolved identity of the caller.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::identity::StoredIdentity;
use super::verifier::VerifiedClaims;

/// Authenticated user for the lifetime of one request.
///
/// Built once by the auth middleware after the token is verified and the
/// registration is found, then handed to handlers through request
/// extensions. Never cached across requests: the registrations table is
/// authoritative and a role change takes effect on the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserContext {
    /// Supabase user id (`sub` claim)
    pub subject_id: String,
    /// Email from the token
    pub email: String,
    /// `registrations.id`
    pub registration_id: String,
    /// Role from `registrations.role`, free-form
    pub role: String,
}

impl UserContext {
    pub fn from_parts(claims: VerifiedClaims, identity: StoredIdentity) -> Self {
        Self {
            subject_id: claims.subject,
            email: claims.email,
            registration_id: identity.id,
            role: identity.role,
        }
    }
}
