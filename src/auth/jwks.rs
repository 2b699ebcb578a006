// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Cache model
//!
//! The cache holds one *generation* of keys at a time: every successful fetch
//! builds a complete `kid -> key` map and swaps it in under the write lock, so
//! readers see either the previous map or the new one, never a mix.
//!
//! - Keys are refreshed once the TTL (default 1 hour) has elapsed
//! - An unknown `kid` on a fresh cache refetches at most once per
//!   `min_refresh_interval`, which covers signer rotation without letting
//!   garbage key ids hammer the issuer
//! - Refreshes are serialised; waiters that find a newer generation than the
//!   one they saw reuse it instead of fetching again
//! - A refresh runs on its own task and completes even if the request that
//!   triggered it is dropped
//! - Stale cache is used on fetch failure (fail-open for availability)
//! - A failed fetch is remembered for `failure_backoff`: callers queued
//!   behind it and callers arriving during the window get its outcome
//!   (stale key or the error) without fetching again
//!
//! Only `kty = "EC"`, `crv = "P-256"` keys are retained; everything else in
//! the document is skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::AuthError;

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between refetches caused by unknown key ids.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on a single key discovery round-trip.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a failed fetch suppresses further fetches.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Byte length of a P-256 affine coordinate.
const P256_COORDINATE_LEN: usize = 32;

/// JWKS document as published by the key discovery endpoint.
///
/// Every field is optional so that one exotic entry cannot fail the whole
/// document; filtering happens in [`parse_key_set`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkDocument {
    #[serde(default)]
    pub keys: Vec<RawJwk>,
}

/// A single, unvalidated JWK entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJwk {
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// A P-256 public key usable for ES256 verification.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Where key sets come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkDocument, AuthError>;
}

/// Fetches the key set over HTTPS.
pub struct HttpKeySource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySource {
    /// Create a source for the given JWKS URL.
    ///
    /// # Arguments
    /// - `url`: e.g. `https://<project>.supabase.co/auth/v1/.well-known/jwks.json`
    pub fn new(url: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkDocument, AuthError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::UpstreamTimeout("jwks fetch")
            } else {
                AuthError::UpstreamUnavailable(format!("JWKS request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(AuthError::UpstreamUnavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkDocument>()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(format!("malformed JWKS document: {e}")))
    }
}

/// One complete fetch result.
struct KeySet {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Instant,
    generation: u64,
}

/// Most recent failed fetch.
struct FailedFetch {
    at: Instant,
    error: AuthError,
}

/// Shared, injectable cache of issuer verification keys.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    min_refresh_interval: Duration,
    fetch_timeout: Duration,
    failure_backoff: Duration,
    state: Arc<RwLock<Option<Arc<KeySet>>>>,
    last_failure: Arc<Mutex<Option<FailedFetch>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            fetch_timeout: FETCH_TIMEOUT,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
            state: Arc::new(RwLock::new(None)),
            last_failure: Arc::new(Mutex::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Cache backed by [`HttpKeySource`].
    pub fn from_url(url: impl Into<String>) -> Result<Self, AuthError> {
        Ok(Self::new(Arc::new(HttpKeySource::new(url)?)))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the verification key for `kid`, refreshing when stale.
    pub async fn get_key(&self, kid: &str) -> Result<VerificationKey, AuthError> {
        let observed = self.snapshot().await;

        let mut fresh = false;
        if let Some(set) = &observed {
            let age = set.fetched_at.elapsed();
            if age < self.ttl {
                if let Some(key) = set.keys.get(kid) {
                    return Ok(key.clone());
                }
                if age < self.min_refresh_interval {
                    return Err(AuthError::KeyNotFound(kid.to_string()));
                }
                fresh = true;
            }
        }

        if let Some(e) = self.recent_failure().await {
            if fresh {
                return Err(AuthError::KeyNotFound(kid.to_string()));
            }
            return stale_or(observed.as_deref(), kid, e);
        }
        if fresh {
            debug!(kid = %kid, "Unknown kid on fresh key set, refetching");
        }

        let observed_generation = observed.as_ref().map_or(0, |set| set.generation);
        match self.spawn_refresh(Some(observed_generation)).await {
            Ok(set) => set
                .keys
                .get(kid)
                .cloned()
                .ok_or_else(|| AuthError::KeyNotFound(kid.to_string())),
            Err(e) => {
                warn!(error = %e, kid = %kid, "JWKS refresh failed");
                stale_or(observed.as_deref(), kid, e)
            }
        }
    }

    /// Force a fetch and replace the cached key set.
    ///
    /// Returns the number of usable keys. On failure the previous key set is
    /// left in place.
    pub async fn refresh(&self) -> Result<usize, AuthError> {
        let set = self.spawn_refresh(None).await?;
        Ok(set.keys.len())
    }

    /// Whether a key set is cached and younger than the TTL.
    pub async fn is_cached(&self) -> bool {
        self.snapshot()
            .await
            .is_some_and(|set| set.fetched_at.elapsed() < self.ttl)
    }

    /// Key ids of the current generation, sorted.
    pub async fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .snapshot()
            .await
            .map(|set| set.keys.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of successful fetches so far (0 = never fetched).
    pub async fn generation(&self) -> u64 {
        self.snapshot().await.map_or(0, |set| set.generation)
    }

    async fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.state.read().await.clone()
    }

    /// The last fetch error, if it happened within the backoff window.
    async fn recent_failure(&self) -> Option<AuthError> {
        self.last_failure
            .lock()
            .await
            .as_ref()
            .filter(|failed| failed.at.elapsed() < self.failure_backoff)
            .map(|failed| failed.error.clone())
    }

    /// Run the refresh on its own task so the result lands in the cache even
    /// if the caller is cancelled.
    async fn spawn_refresh(&self, observed: Option<u64>) -> Result<Arc<KeySet>, AuthError> {
        let cache = self.clone();
        tokio::spawn(async move { cache.refresh_serialized(observed).await })
            .await
            .map_err(|e| AuthError::Internal(format!("JWKS refresh task failed: {e}")))?
    }

    /// `observed`: generation the caller saw; `None` forces a fetch and
    /// ignores the failure backoff.
    async fn refresh_serialized(&self, observed: Option<u64>) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(observed) = observed {
            if let Some(current) = self.snapshot().await {
                if current.generation > observed {
                    return Ok(current);
                }
            }
            // The attempt this caller queued behind failed.
            if let Some(e) = self.recent_failure().await {
                return Err(e);
            }
        }

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::UpstreamTimeout("jwks fetch")),
        };
        let document = match fetched {
            Ok(document) => document,
            Err(e) => {
                *self.last_failure.lock().await = Some(FailedFetch {
                    at: Instant::now(),
                    error: e.clone(),
                });
                return Err(e);
            }
        };
        let keys = parse_key_set(&document);
        *self.last_failure.lock().await = None;

        let mut state = self.state.write().await;
        let generation = state.as_ref().map_or(0, |set| set.generation) + 1;
        let set = Arc::new(KeySet {
            keys,
            fetched_at: Instant::now(),
            generation,
        });
        *state = Some(Arc::clone(&set));

        info!(generation, keys = set.keys.len(), "JWKS refreshed");
        Ok(set)
    }
}

/// Serve `kid` from the previous generation, or surface `error`.
fn stale_or(
    observed: Option<&KeySet>,
    kid: &str,
    error: AuthError,
) -> Result<VerificationKey, AuthError> {
    match observed.and_then(|set| set.keys.get(kid)) {
        Some(key) => {
            debug!(kid = %kid, "Serving stale key");
            Ok(key.clone())
        }
        None => Err(error),
    }
}

/// Build the usable `kid -> key` map from a JWKS document.
pub fn parse_key_set(document: &JwkDocument) -> HashMap<String, VerificationKey> {
    let mut keys = HashMap::new();
    for jwk in &document.keys {
        match to_verification_key(jwk) {
            Ok(Some(key)) => {
                if keys.contains_key(&key.kid) {
                    warn!(kid = %key.kid, "Duplicate kid in JWKS, keeping first entry");
                    continue;
                }
                keys.insert(key.kid.clone(), key);
            }
            Ok(None) => {}
            Err(reason) => {
                warn!(kid = ?jwk.kid, reason = %reason, "Skipping undecodable JWK");
            }
        }
    }
    keys
}

/// `Ok(None)` for entries of another scheme, `Err` for broken P-256 entries.
fn to_verification_key(jwk: &RawJwk) -> Result<Option<VerificationKey>, String> {
    if jwk.kty != "EC" || jwk.crv.as_deref() != Some("P-256") {
        debug!(kid = ?jwk.kid, kty = %jwk.kty, "Ignoring non P-256 key");
        return Ok(None);
    }
    if jwk.alg.as_deref().is_some_and(|alg| alg != "ES256")
        || jwk.key_use.as_deref().is_some_and(|u| u != "sig")
    {
        return Ok(None);
    }

    let kid = jwk
        .kid
        .as_deref()
        .filter(|kid| !kid.is_empty())
        .ok_or("missing kid")?;
    let x = jwk.x.as_deref().ok_or("missing x coordinate")?;
    let y = jwk.y.as_deref().ok_or("missing y coordinate")?;

    for (name, coordinate) in [("x", x), ("y", y)] {
        let bytes = Base64UrlUnpadded::decode_vec(coordinate)
            .map_err(|e| format!("{name} is not base64url: {e}"))?;
        if bytes.len() != P256_COORDINATE_LEN {
            return Err(format!("{name} has {} bytes, expected 32", bytes.len()));
        }
    }

    let decoding_key = DecodingKey::from_ec_components(x, y)
        .map_err(|e| format!("failed to create EC key: {e}"))?;

    Ok(Some(VerificationKey {
        kid: kid.to_string(),
        decoding_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil::{jwks_document as document, EcSigner, StubKeySource};
    use serde_json::json;

    #[tokio::test]
    async fn get_key_fetches_once_then_serves_from_cache() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source.clone());

        assert!(!cache.is_cached().await);
        assert_eq!(cache.get_key("k1").await.unwrap().kid(), "k1");
        assert_eq!(cache.get_key("k1").await.unwrap().kid(), "k1");
        assert_eq!(source.fetch_count(), 1);
        assert!(cache.is_cached().await);
    }

    #[tokio::test]
    async fn unknown_kid_in_fresh_set_is_key_not_found() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source.clone());

        let result = cache.get_key("k9").await;
        assert!(matches!(result, Err(AuthError::KeyNotFound(kid)) if kid == "k9"));

        // Inside the refetch window the fresh set is authoritative.
        let result = cache.get_key("k9").await;
        assert!(matches!(result, Err(AuthError::KeyNotFound(_))));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn unknown_kid_refetches_and_picks_up_rotated_key() {
        let old = EcSigner::generate("old");
        let new = EcSigner::generate("new");
        let source = StubKeySource::new(document(&[&old]));
        let cache = KeyCache::new(source.clone()).with_min_refresh_interval(Duration::ZERO);

        cache.get_key("old").await.unwrap();
        source.set_document(document(&[&new]));

        assert_eq!(cache.get_key("new").await.unwrap().kid(), "new");
        assert_eq!(source.fetch_count(), 2);
        assert_eq!(cache.key_ids().await, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn expired_cache_is_refreshed() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source.clone()).with_ttl(Duration::ZERO);

        cache.get_key("k1").await.unwrap();
        cache.get_key("k1").await.unwrap();
        assert_eq!(source.fetch_count(), 2);
        assert_eq!(cache.generation().await, 2);
    }

    #[tokio::test]
    async fn stale_key_is_served_when_refresh_fails() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source.clone()).with_ttl(Duration::ZERO);

        cache.get_key("k1").await.unwrap();
        source.fail_with("connection refused");

        assert_eq!(cache.get_key("k1").await.unwrap().kid(), "k1");
        // A key that was never cached still surfaces the upstream failure.
        assert!(matches!(
            cache.get_key("k2").await,
            Err(AuthError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn failed_refresh_leaves_previous_generation_in_place() {
        let a = EcSigner::generate("a");
        let b = EcSigner::generate("b");
        let source = StubKeySource::new(document(&[&a, &b]));
        let cache = KeyCache::new(source.clone());

        assert_eq!(cache.refresh().await.unwrap(), 2);
        source.fail_with("HTTP 502");
        assert!(cache.refresh().await.is_err());

        assert_eq!(cache.key_ids().await, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.generation().await, 1);
    }

    #[tokio::test]
    async fn failure_on_empty_cache_surfaces_error() {
        let source = StubKeySource::failing("connection refused");
        let cache = KeyCache::new(source);
        assert!(matches!(
            cache.get_key("k1").await,
            Err(AuthError::UpstreamUnavailable(_))
        ));
        assert_eq!(cache.generation().await, 0);
    }

    #[tokio::test]
    async fn refresh_twice_with_unchanged_remote_is_idempotent() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source);

        cache.refresh().await.unwrap();
        let before = cache.key_ids().await;
        let x_before = cache.get_key("k1").await.unwrap();
        cache.refresh().await.unwrap();

        assert_eq!(cache.key_ids().await, before);
        let x_after = cache.get_key("k1").await.unwrap();
        assert_eq!(x_before.kid(), x_after.kid());
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer])).with_delay(Duration::from_secs(5));
        let cache = KeyCache::new(source).with_fetch_timeout(Duration::from_millis(50));

        assert!(matches!(
            cache.get_key("k1").await,
            Err(AuthError::UpstreamTimeout(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_a_single_fetch() {
        let signer = EcSigner::generate("k1");
        let source =
            StubKeySource::new(document(&[&signer])).with_delay(Duration::from_millis(100));
        let cache = KeyCache::new(source.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_key("k1").await.map(|k| k.kid().to_string()) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "k1");
        }
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_mixed_generations() {
        let gen1 = [EcSigner::generate("a1"), EcSigner::generate("b1")];
        let gen2 = [EcSigner::generate("a2"), EcSigner::generate("b2")];
        let doc1 = document(&[&gen1[0], &gen1[1]]);
        let doc2 = document(&[&gen2[0], &gen2[1]]);
        let source = StubKeySource::new(doc1.clone());
        let cache = KeyCache::new(source.clone());
        cache.refresh().await.unwrap();

        let writer = {
            let cache = cache.clone();
            let source = source.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    source.set_document(if i % 2 == 0 { doc2.clone() } else { doc1.clone() });
                    cache.refresh().await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let ids = cache.key_ids().await;
                        assert!(
                            ids == ["a1", "b1"] || ids == ["a2", "b2"],
                            "mixed generations observed: {ids:?}"
                        );
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn outage_with_hanging_source_costs_one_timeout() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source.clone())
            .with_ttl(Duration::from_millis(50))
            .with_fetch_timeout(Duration::from_millis(100));
        cache.get_key("k1").await.unwrap();

        let source = source.with_delay(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(80)).await;

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let started = Instant::now();
                    let key = cache.get_key("k1").await;
                    (started.elapsed(), key.map(|k| k.kid().to_string()))
                })
            })
            .collect();

        let mut worst = Duration::ZERO;
        for caller in callers {
            let (elapsed, kid) = caller.await.unwrap();
            assert_eq!(kid.unwrap(), "k1");
            worst = worst.max(elapsed);
        }
        assert!(worst < Duration::from_millis(300), "worst latency {worst:?}");
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failed_fetch_backs_off_then_recovers() {
        let signer = EcSigner::generate("k1");
        let source = StubKeySource::new(document(&[&signer]));
        let cache = KeyCache::new(source.clone())
            .with_ttl(Duration::ZERO)
            .with_failure_backoff(Duration::from_millis(200));
        cache.get_key("k1").await.unwrap();

        let source = source.with_delay(Duration::from_millis(50));
        source.fail_with("HTTP 503");

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_key("k1").await.map(|k| k.kid().to_string()) })
            })
            .collect();
        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap(), "k1");
        }
        assert_eq!(source.fetch_count(), 2);

        // Inside the window: stale key, no fetch. Unknown kids get the failure.
        assert_eq!(cache.get_key("k1").await.unwrap().kid(), "k1");
        assert!(matches!(
            cache.get_key("k2").await,
            Err(AuthError::UpstreamUnavailable(_))
        ));
        assert_eq!(source.fetch_count(), 2);

        source.set_document(document(&[&signer]));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(cache.get_key("k1").await.unwrap().kid(), "k1");
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(cache.generation().await, 2);
    }

    #[tokio::test]
    async fn refresh_completes_when_caller_is_cancelled() {
        let signer = EcSigner::generate("k1");
        let source =
            StubKeySource::new(document(&[&signer])).with_delay(Duration::from_millis(100));
        let cache = KeyCache::new(source.clone());

        let caller = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_key("k1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(cache.generation().await, 1);
        assert_eq!(source.fetch_count(), 1);
    }

    #[test]
    fn parse_skips_foreign_and_broken_entries() {
        let good = EcSigner::generate("good");
        let mut wrong_curve = good.jwk();
        wrong_curve["kid"] = json!("p384");
        wrong_curve["crv"] = json!("P-384");
        let mut bad_base64 = good.jwk();
        bad_base64["kid"] = json!("broken");
        bad_base64["x"] = json!("not base64!");
        let mut short = good.jwk();
        short["kid"] = json!("short");
        short["y"] = json!("AAAA");
        let mut enc = good.jwk();
        enc["kid"] = json!("enc");
        enc["use"] = json!("enc");

        let document: JwkDocument = serde_json::from_value(json!({
            "keys": [
                { "kty": "RSA", "kid": "rsa", "n": "AQAB", "e": "AQAB" },
                { "kty": "OKP", "kid": "ed", "crv": "Ed25519", "x": "AAAA" },
                wrong_curve,
                bad_base64,
                short,
                enc,
                good.jwk(),
            ]
        }))
        .unwrap();

        let keys = parse_key_set(&document);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("good"));
    }

    #[test]
    fn document_without_keys_field_parses_empty() {
        let document: JwkDocument = serde_json::from_str("{}").unwrap();
        assert!(parse_key_set(&document).is_empty());
    }

    #[tokio::test]
    async fn http_source_fetches_document() {
        use axum::{http::StatusCode, routing::get, Json, Router};

        let signer = EcSigner::generate("k1");
        let jwk = signer.jwk();
        let app = Router::new()
            .route(
                "/.well-known/jwks.json",
                get(move || {
                    let jwk = jwk.clone();
                    async move { Json(json!({ "keys": [jwk] })) }
                }),
            )
            .route("/broken", get(|| async { StatusCode::BAD_GATEWAY }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let cache = KeyCache::from_url(format!("http://{addr}/.well-known/jwks.json")).unwrap();
        assert_eq!(cache.get_key("k1").await.unwrap().kid(), "k1");

        let broken = HttpKeySource::new(format!("http://{addr}/broken")).unwrap();
        assert!(matches!(
            broken.fetch().await,
            Err(AuthError::UpstreamUnavailable(_))
        ));
    }
}
