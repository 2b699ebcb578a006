// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maps a verified email claim to the caller's registration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::AuthError;
use crate::storage::StoreError;

/// Upper bound on the registration lookup.
pub const IDENTITY_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Registration row the auth layer cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    /// `registrations.id`
    pub id: String,
    pub role: String,
}

/// Point lookup of registrations by email.
///
/// `Ok(None)` means "no such registration" and must stay distinct from
/// connectivity failures.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_email(&self, email: &str)
        -> Result<Option<StoredIdentity>, StoreError>;
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            timeout: IDENTITY_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `email` to exactly one registration.
    pub async fn resolve(&self, email: &str) -> Result<StoredIdentity, AuthError> {
        let lookup = self.store.find_identity_by_email(email);
        match tokio::time::timeout(self.timeout, lookup).await {
            Err(_) | Ok(Err(StoreError::Timeout(_))) => {
                tracing::warn!("Identity lookup timed out");
                Err(AuthError::UpstreamTimeout("identity lookup"))
            }
            Ok(Err(e)) => Err(AuthError::UpstreamUnavailable(format!(
                "identity lookup failed: {e}"
            ))),
            Ok(Ok(None)) => {
                tracing::info!("Token holder has no registration");
                Err(AuthError::UserNotRegistered)
            }
            Ok(Ok(Some(identity))) => Ok(identity),
        }
    }
}
