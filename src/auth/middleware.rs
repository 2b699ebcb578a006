// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Two layers, applied in this order:
//!
//! - [`require_auth`] runs verify → resolve for every request on the
//!   authenticated router and attaches the [`UserContext`].
//! - [`require_roles`] guards individual routes with an [`AllowedRoles`]
//!   allow-list and reads the identity the first layer attached.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/projects", post(create_project))
//!     .route_layer(from_fn_with_state(AllowedRoles::project_managers(), require_roles))
//!     .route_layer(from_fn_with_state(authenticator, require_auth));
//! ```

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::{attach_identity, current_identity};
use super::identity::IdentityResolver;
use super::roles::{enforce, AllowedRoles};
use super::verifier::TokenVerifier;
use super::{AuthError, UserContext};

/// Extract the raw token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Verification and identity resolution for one request.
#[derive(Clone)]
pub struct Authenticator {
    verifier: TokenVerifier,
    resolver: IdentityResolver,
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier, resolver: IdentityResolver) -> Self {
        Self { verifier, resolver }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Token present → verified → registered.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<UserContext, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.verifier.verify(token).await?;
        let identity = self.resolver.resolve(&claims.email).await?;
        Ok(UserContext::from_parts(claims, identity))
    }

    /// Full pipeline including the role check.
    pub async fn authorize_request(
        &self,
        headers: &HeaderMap,
        allowed: &AllowedRoles,
    ) -> Result<UserContext, AuthError> {
        let user = self.authenticate(headers).await?;
        enforce(Some(&user), allowed)?;
        Ok(user)
    }
}

/// Reject unauthenticated requests, attach the identity otherwise.
pub async fn require_auth(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match auth.authenticate(request.headers()).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    tracing::debug!(
        registration_id = %user.registration_id,
        role = %user.role,
        "Request authenticated"
    );

    if let Err(e) = attach_identity(request.extensions_mut(), user) {
        return e.into_response();
    }
    next.run(request).await
}

/// Reject callers whose role is not in the allow-list.
///
/// Must sit inside [`require_auth`]; without an attached identity every
/// request is refused.
pub async fn require_roles(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = enforce(current_identity(request.extensions()), &allowed) {
        return e.into_response();
    }
    next.run(request).await
}
