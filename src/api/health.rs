// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "up" while the process serves requests.
    pub status: String,
    /// Database reachability ("up" or "down").
    pub db_status: String,
    /// Signing key cache: "ok" (fresh), "stale" (past its TTL, still
    /// served) or "empty" (never fetched).
    /// Only present when ES256 tokens are accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
}

/// Report the key cache state. Never fetches: refreshes are driven by
/// token verification only.
async fn jwks_status(state: &AppState) -> Option<String> {
    let keys = state.auth.verifier().key_cache()?;
    let status = if keys.is_cached().await {
        "ok"
    } else if keys.generation().await > 0 {
        "stale"
    } else {
        "empty"
    };
    Some(status.to_string())
}

/// Server and dependency health.
///
/// Always answers 200; dependency state is reported in the body.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_status = match state.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            "down"
        }
    };

    Json(HealthResponse {
        status: "up".to_string(),
        db_status: db_status.to_string(),
        jwks: jwks_status(&state).await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::auth::testutil::{jwks_document, EcSigner, StubKeySource};
    use crate::auth::{AcceptedSchemes, KeyCache, TokenVerifier};
    use crate::storage::InMemoryStore;

    fn state_with(cache: KeyCache) -> AppState {
        let verifier = TokenVerifier::new(AcceptedSchemes::ASYMMETRIC_ONLY).with_key_cache(cache);
        AppState::new(Arc::new(InMemoryStore::new()), verifier)
    }

    #[tokio::test]
    async fn health_reports_key_cache_without_fetching() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(jwks_document(&[&signer]));
        let cache = KeyCache::new(source.clone()).with_ttl(Duration::from_millis(50));
        let state = state_with(cache.clone());

        for _ in 0..3 {
            let Json(body) = health(State(state.clone())).await;
            assert_eq!(body.jwks.as_deref(), Some("empty"));
        }
        assert_eq!(source.fetch_count(), 0);

        cache.refresh().await.unwrap();
        let Json(body) = health(State(state.clone())).await;
        assert_eq!(body.jwks.as_deref(), Some("ok"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        let Json(body) = health(State(state)).await;
        assert_eq!(body.jwks.as_deref(), Some("stale"));
        assert_eq!(body.db_status, "up");
        assert_eq!(source.fetch_count(), 1);
    }
}
