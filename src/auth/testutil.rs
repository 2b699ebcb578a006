// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token minting and key source doubles for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde_json::{json, Value};

use super::error::AuthError;
use super::jwks::{JwkDocument, KeySource};

pub const TEST_SECRET: &str = "s3cr3t";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Standard Supabase-shaped claims.
pub fn claims(sub: &str, email: &str, exp: i64) -> Value {
    json!({
        "sub": sub,
        "email": email,
        "exp": exp,
        "aud": "authenticated",
        "role": "authenticated",
    })
}

pub fn hs256_token(secret: &str, claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Assemble a token with an arbitrary header and a junk signature.
pub fn forged_token(header: &Value, claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{claims}.c2lnbmF0dXJl")
}

/// P-256 signing key with its public JWK.
pub struct EcSigner {
    pub kid: String,
    pkcs8: Vec<u8>,
    public_point: Vec<u8>,
}

impl EcSigner {
    pub fn generate(kid: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        Self {
            kid: kid.to_string(),
            pkcs8: pkcs8.as_ref().to_vec(),
            // Uncompressed SEC1: 0x04 || x || y
            public_point: pair.public_key().as_ref().to_vec(),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "EC",
            "crv": "P-256",
            "kid": self.kid,
            "alg": "ES256",
            "use": "sig",
            "x": URL_SAFE_NO_PAD.encode(&self.public_point[1..33]),
            "y": URL_SAFE_NO_PAD.encode(&self.public_point[33..65]),
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(Some(&self.kid), claims)
    }

    pub fn sign_with_kid(&self, kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = kid.map(str::to_string);
        encode(&header, claims, &EncodingKey::from_ec_der(&self.pkcs8)).unwrap()
    }
}

/// In-memory [`KeySource`] that counts fetches.
pub struct StubKeySource {
    response: Mutex<Result<JwkDocument, String>>,
    delay: Mutex<Duration>,
    fetches: AtomicUsize,
}

impl StubKeySource {
    pub fn new(document: JwkDocument) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(document)),
            delay: Mutex::new(Duration::ZERO),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let source = Self::new(JwkDocument::default());
        source.fail_with(reason);
        source
    }

    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn set_document(&self, document: JwkDocument) {
        *self.response.lock().unwrap() = Ok(document);
    }

    pub fn fail_with(&self, reason: &str) {
        *self.response.lock().unwrap() = Err(reason.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StubKeySource {
    async fn fetch(&self) -> Result<JwkDocument, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(AuthError::UpstreamUnavailable)
    }
}

/// Document publishing the given signers.
pub fn jwks_document(signers: &[&EcSigner]) -> JwkDocument {
    let keys: Vec<Value> = signers.iter().map(|s| s.jwk()).collect();
    serde_json::from_value(json!({ "keys": keys })).unwrap()
}
