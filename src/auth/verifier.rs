// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT verification for both Supabase signing schemes.
//!
//! The header's `alg` is inspected exactly once and turned into a
//! [`SigningScheme`]; from then on verification only ever uses the key
//! material belonging to that scheme:
//!
//! | `alg` | Scheme | Key |
//! |-------|--------|-----|
//! | `HS256`, `HS384`, `HS512` | symmetric | configured shared secret |
//! | `ES256` | asymmetric | JWKS entry named by the header `kid` |
//! | anything else | rejected | - |
//!
//! Which schemes a deployment trusts is explicit configuration
//! ([`AcceptedSchemes`]); a token signed under a scheme that is not accepted
//! is rejected even if the key material happens to be present.

use std::str::FromStr;

use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Header, Validation,
};
use serde::Deserialize;

use super::error::AuthError;
use super::jwks::KeyCache;

/// Signing schemes a deployment is willing to trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedSchemes {
    pub symmetric: bool,
    pub asymmetric: bool,
}

impl AcceptedSchemes {
    pub const SYMMETRIC_ONLY: Self = Self {
        symmetric: true,
        asymmetric: false,
    };
    pub const ASYMMETRIC_ONLY: Self = Self {
        symmetric: false,
        asymmetric: true,
    };
    pub const BOTH: Self = Self {
        symmetric: true,
        asymmetric: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.symmetric && !self.asymmetric
    }
}

impl FromStr for AcceptedSchemes {
    type Err = String;

    /// Parses a comma separated list such as `symmetric,asymmetric`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut accepted = Self {
            symmetric: false,
            asymmetric: false,
        };
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "symmetric" | "hs256" | "hmac" => accepted.symmetric = true,
                "asymmetric" | "es256" | "jwks" => accepted.asymmetric = true,
                other => return Err(format!("unknown signing scheme '{other}'")),
            }
        }
        if accepted.is_empty() {
            return Err("no signing scheme listed".to_string());
        }
        Ok(accepted)
    }
}

/// Scheme selected from the token header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningScheme {
    /// HMAC with the shared secret.
    Symmetric { algorithm: Algorithm },
    /// ES256 with the JWKS key named by `kid`.
    Asymmetric { key_id: String },
}

impl SigningScheme {
    pub fn from_header(header: &Header) -> Result<Self, AuthError> {
        match header.alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(SigningScheme::Symmetric {
                algorithm: header.alg,
            }),
            Algorithm::ES256 => {
                let key_id = header
                    .kid
                    .as_deref()
                    .filter(|kid| !kid.is_empty())
                    .ok_or_else(|| AuthError::invalid("ES256 token without kid"))?;
                Ok(SigningScheme::Asymmetric {
                    key_id: key_id.to_string(),
                })
            }
            other => Err(AuthError::invalid(format!("unsupported algorithm {other:?}"))),
        }
    }
}

/// Claims as they appear in the token payload.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    exp: i64,
}

/// Claims of a token whose signature and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Supabase user id (`sub`)
    pub subject: String,
    /// Join key into `registrations`
    pub email: String,
    /// `exp` as a Unix timestamp
    pub expires_at: i64,
}

/// Verifies bearer tokens against the configured key material.
#[derive(Clone)]
pub struct TokenVerifier {
    accepted: AcceptedSchemes,
    secret: Option<DecodingKey>,
    keys: Option<KeyCache>,
}

impl TokenVerifier {
    pub fn new(accepted: AcceptedSchemes) -> Self {
        Self {
            accepted,
            secret: None,
            keys: None,
        }
    }

    /// Verifier accepting only HS* tokens signed with `secret`.
    pub fn symmetric(secret: impl AsRef<[u8]>) -> Self {
        Self::new(AcceptedSchemes::SYMMETRIC_ONLY).with_secret(secret)
    }

    pub fn with_secret(mut self, secret: impl AsRef<[u8]>) -> Self {
        self.secret = Some(DecodingKey::from_secret(secret.as_ref()));
        self
    }

    pub fn with_key_cache(mut self, keys: KeyCache) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn accepted(&self) -> AcceptedSchemes {
        self.accepted
    }

    pub fn key_cache(&self) -> Option<&KeyCache> {
        self.keys.as_ref()
    }

    /// Check signature and expiry and extract identity claims.
    pub async fn verify(&self, raw_token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(raw_token)
            .map_err(|e| AuthError::invalid(format!("malformed token header: {e}")))?;

        match SigningScheme::from_header(&header)? {
            SigningScheme::Symmetric { algorithm } => {
                if !self.accepted.symmetric {
                    return Err(AuthError::invalid("symmetric scheme not accepted"));
                }
                let secret = self
                    .secret
                    .as_ref()
                    .ok_or_else(|| AuthError::invalid("no shared secret configured"))?;
                decode_claims(raw_token, secret, algorithm)
            }
            SigningScheme::Asymmetric { key_id } => {
                if !self.accepted.asymmetric {
                    return Err(AuthError::invalid("asymmetric scheme not accepted"));
                }
                let keys = self
                    .keys
                    .as_ref()
                    .ok_or_else(|| AuthError::invalid("no key discovery configured"))?;
                let key = keys.get_key(&key_id).await.map_err(|e| match e {
                    AuthError::KeyNotFound(kid) => {
                        AuthError::invalid(format!("unknown signing key '{kid}'"))
                    }
                    other => other,
                })?;
                decode_claims(raw_token, key.decoding_key(), Algorithm::ES256)
            }
        }
    }
}

fn decode_claims(
    raw_token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<VerifiedClaims, AuthError> {
    // No clock skew allowance on `exp`.
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<TokenClaims>(raw_token, key, &validation).map_err(|e| {
        AuthError::invalid(match e.kind() {
            ErrorKind::ExpiredSignature => "token expired".to_string(),
            ErrorKind::InvalidSignature => "signature mismatch".to_string(),
            ErrorKind::InvalidAlgorithm => "algorithm mismatch".to_string(),
            _ => format!("token rejected: {e}"),
        })
    })?;

    let claims = token_data.claims;
    let email = claims
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AuthError::invalid("missing email claim"))?;

    Ok(VerifiedClaims {
        subject: claims.sub,
        email,
        expires_at: claims.exp,
    })
}
