// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request identity slot.
//!
//! The auth middleware attaches the resolved [`UserContext`] to the request
//! extensions exactly once; handlers read it back through [`CurrentUser`] or [`current_identity`]:
//!
//! ```rust,ignore
//! async fn my_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
//!     // user.registration_id, user.role
//! }
//! ```
//!
//! Extensions belong to a single request, so the slot starts empty for every
//! incoming request and is dropped with it.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
};

use super::{AuthError, UserContext};

/// Store the resolved identity for the rest of the request.
///
/// Fails if an identity is already attached.
pub fn attach_identity(extensions: &mut Extensions, user: UserContext) -> Result<(), AuthError> {
    if extensions.get::<UserContext>().is_some() {
        return Err(AuthError::Internal(
            "identity already attached to request".to_string(),
        ));
    }
    extensions.insert(user);
    Ok(())
}

/// The identity attached to this request, if any.
pub fn current_identity(extensions: &Extensions) -> Option<&UserContext> {
    extensions.get::<UserContext>()
}

/// Extractor for routes behind the auth middleware.
///
/// Rejects with `401 authentication_required` when nothing was attached,
/// e.g. a handler mounted outside the authenticated router.
pub struct CurrentUser(pub UserContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_identity(&parts.extensions)
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::AuthenticationRequired)
    }
}
