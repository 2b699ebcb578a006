// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{Authenticator, IdentityResolver, IdentityStore, TokenVerifier};
use crate::storage::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub auth: Authenticator,
}

impl AppState {
    /// Share one backend between the business routes and identity lookup.
    pub fn new<S>(store: Arc<S>, verifier: TokenVerifier) -> Self
    where
        S: TaskStore + IdentityStore + 'static,
    {
        let resolver = IdentityResolver::new(store.clone());
        Self {
            store,
            auth: Authenticator::new(verifier, resolver),
        }
    }
}
