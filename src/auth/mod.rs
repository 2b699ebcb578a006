// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Supabase-issued bearer tokens gate every non-public route.
//!
//! ## Auth Flow
//!
//! 1. Frontend signs the user in with Supabase
//! 2. Frontend sends `Authorization: Bearer <access token>`
//! 3. Server:
//!    - Picks the signing scheme from the token header (HS* shared secret,
//!      or ES256 with a key id looked up in the JWKS cache)
//!    - Verifies signature and expiry, extracts `sub` and `email`
//!    - Looks the email up in `registrations` to get the internal id and role
//!    - Checks the role against the route's allow-list
//!    - Attaches the [`UserContext`] to the request
//!
//! ## Security
//!
//! - Accepted signing schemes are configured explicitly
//! - Expired tokens are always rejected (no clock leeway)
//! - JWKS is cached with a TTL; a stale key set is served if refresh fails
//! - Failures collapse to generic client messages; details go to the logs

pub mod claims;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwks;
pub mod middleware;
pub mod roles;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use claims::UserContext;
pub use error::AuthError;
pub use extractor::{attach_identity, current_identity, CurrentUser};
pub use identity::{IdentityResolver, IdentityStore, StoredIdentity};
pub use jwks::{HttpKeySource, KeyCache, KeySource};
pub use middleware::{require_auth, require_roles, Authenticator};
pub use roles::{authorize, AllowedRoles, PROJECT_MANAGER_ROLES};
pub use verifier::{AcceptedSchemes, SigningScheme, TokenVerifier, VerifiedClaims};
