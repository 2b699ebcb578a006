// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into a typed
//! [`Config`]. Missing or contradictory settings are fatal: the server
//! refuses to start rather than run with a half-configured auth layer.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` / `APP_PORT` | Server bind port | `8080` |
//! | `ENV` | `development` or `production` | `development` |
//! | `DATABASE_URL` | Postgres connection string | Required |
//! | `SUPABASE_JWT_SECRET` | Shared secret for HS256/384/512 tokens | Optional |
//! | `SUPABASE_URL` | Project URL; JWKS at `<url>/auth/v1/.well-known/jwks.json` | Optional |
//! | `AUTH_JWKS_URL` | Explicit JWKS endpoint, overrides `SUPABASE_URL` | Optional |
//! | `AUTH_ACCEPTED_SCHEMES` | `symmetric`, `asymmetric` or `symmetric,asymmetric` | Schemes with key material |
//! | `AUTH_JWKS_TTL_SECS` | JWKS cache lifetime | `3600` |
//! | `RUN_MIGRATIONS` | Apply bundled migrations on boot | `false` |
//! | `LOG_FORMAT` | `pretty`, `json` or `compact` | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug,sqlx=warn` |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::auth::jwks::DEFAULT_CACHE_TTL;
use crate::auth::{AcceptedSchemes, AuthError, KeyCache, TokenVerifier};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
/// Alternate port variable, checked after `PORT`.
pub const APP_PORT_ENV: &str = "APP_PORT";
pub const ENVIRONMENT_ENV: &str = "ENV";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const JWT_SECRET_ENV: &str = "SUPABASE_JWT_SECRET";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const ACCEPTED_SCHEMES_ENV: &str = "AUTH_ACCEPTED_SCHEMES";
pub const JWKS_TTL_ENV: &str = "AUTH_JWKS_TTL_SECS";
pub const RUN_MIGRATIONS_ENV: &str = "RUN_MIGRATIONS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Stand-in for secrets in `Debug` output.
const REDACTED: &str = "<redacted>";

/// Path of the JWKS document under a Supabase project URL.
pub const SUPABASE_JWKS_PATH: &str = "/auth/v1/.well-known/jwks.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("no token signing scheme is accepted; set SUPABASE_JWT_SECRET and/or SUPABASE_URL")]
    NoAcceptedScheme,
    #[error("{scheme} tokens are accepted but {needs} is not set")]
    MissingKeyMaterial {
        scheme: &'static str,
        needs: &'static str,
    },
    #[error("failed to build token verifier: {0}")]
    Verifier(#[from] AuthError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Token verification settings.
#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: Option<String>,
    pub jwks_url: Option<Url>,
    pub accepted: AcceptedSchemes,
    pub jwks_ttl: Duration,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| REDACTED))
            .field("jwks_url", &self.jwks_url.as_ref().map(Url::as_str))
            .field("accepted", &self.accepted)
            .field("jwks_ttl", &self.jwks_ttl)
            .finish()
    }
}

impl AuthSettings {
    /// Build the verifier, wiring the JWKS cache only when asymmetric tokens
    /// are accepted.
    pub fn build_verifier(&self) -> Result<TokenVerifier, ConfigError> {
        let mut verifier = TokenVerifier::new(self.accepted);

        if self.accepted.symmetric {
            let secret = self.jwt_secret.as_ref().ok_or(ConfigError::MissingKeyMaterial {
                scheme: "symmetric",
                needs: JWT_SECRET_ENV,
            })?;
            verifier = verifier.with_secret(secret);
        }

        if self.accepted.asymmetric {
            let url = self.jwks_url.as_ref().ok_or(ConfigError::MissingKeyMaterial {
                scheme: "asymmetric",
                needs: SUPABASE_URL_ENV,
            })?;
            let keys = KeyCache::from_url(url.as_str())?.with_ttl(self.jwks_ttl);
            verifier = verifier.with_key_cache(keys);
        }

        Ok(verifier)
    }
}

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub database_url: String,
    pub auth: AuthSettings,
    pub run_migrations: bool,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("database_url", &REDACTED)
            .field("auth", &self.auth)
            .field("run_migrations", &self.run_migrations)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = match get(ENVIRONMENT_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: ENVIRONMENT_ENV,
                reason,
            })?,
            None => Environment::Development,
        };

        let port_var = get(PORT_ENV)
            .map(|raw| (PORT_ENV, raw))
            .or_else(|| get(APP_PORT_ENV).map(|raw| (APP_PORT_ENV, raw)));
        let port = match port_var {
            Some((var, raw)) => raw.parse().map_err(|_| ConfigError::Invalid {
                var,
                reason: format!("'{raw}' is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let database_url = get(DATABASE_URL_ENV).ok_or(ConfigError::Missing(DATABASE_URL_ENV))?;

        let jwt_secret = get(JWT_SECRET_ENV);
        let jwks_url = match (get(JWKS_URL_ENV), get(SUPABASE_URL_ENV)) {
            (Some(explicit), _) => Some(parse_jwks_url(JWKS_URL_ENV, &explicit, environment)?),
            (None, Some(base)) => {
                let full = format!("{}{SUPABASE_JWKS_PATH}", base.trim_end_matches('/'));
                Some(parse_jwks_url(SUPABASE_URL_ENV, &full, environment)?)
            }
            (None, None) => None,
        };

        let accepted = match get(ACCEPTED_SCHEMES_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: ACCEPTED_SCHEMES_ENV,
                reason,
            })?,
            None => AcceptedSchemes {
                symmetric: jwt_secret.is_some(),
                asymmetric: jwks_url.is_some(),
            },
        };
        if accepted.is_empty() {
            return Err(ConfigError::NoAcceptedScheme);
        }

        let jwks_ttl = match get(JWKS_TTL_ENV) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError::Invalid {
                    var: JWKS_TTL_ENV,
                    reason: format!("'{raw}' is not a positive number of seconds"),
                })?,
            None => DEFAULT_CACHE_TTL,
        };

        let run_migrations = match get(RUN_MIGRATIONS_ENV) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: RUN_MIGRATIONS_ENV,
                reason: format!("'{raw}' is not a boolean"),
            })?,
            None => false,
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::Pretty,
        };

        let auth = AuthSettings {
            jwt_secret,
            jwks_url,
            accepted,
            jwks_ttl,
        };
        // Surface missing key material at startup, not on the first request.
        auth.build_verifier()?;

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            environment,
            database_url,
            auth,
            run_migrations,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: HOST_ENV,
                reason: format!("{e}"),
            })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// JWKS must come over HTTPS; plain HTTP is tolerated for loopback hosts
/// outside production.
fn parse_jwks_url(
    var: &'static str,
    raw: &str,
    environment: Environment,
) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("{e}"),
    })?;

    let loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    match url.scheme() {
        "https" => Ok(url),
        "http" if loopback && environment == Environment::Development => Ok(url),
        scheme => Err(ConfigError::Invalid {
            var,
            reason: format!("JWKS must be fetched over https, got {scheme}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const DB: (&str, &str) = (DATABASE_URL_ENV, "postgres://localhost/taskdesk");

    #[test]
    fn secret_only_accepts_symmetric() {
        let cfg = config(&[DB, (JWT_SECRET_ENV, "s3cr3t")]).unwrap();
        assert_eq!(cfg.auth.accepted, AcceptedSchemes::SYMMETRIC_ONLY);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.environment, Environment::Development);
        assert!(!cfg.run_migrations);
    }

    #[test]
    fn supabase_url_derives_jwks_endpoint() {
        let cfg = config(&[DB, (SUPABASE_URL_ENV, "https://abc.supabase.co/")]).unwrap();
        assert_eq!(cfg.auth.accepted, AcceptedSchemes::ASYMMETRIC_ONLY);
        assert_eq!(
            cfg.auth.jwks_url.unwrap().as_str(),
            "https://abc.supabase.co/auth/v1/.well-known/jwks.json"
        );
        assert_eq!(cfg.auth.jwks_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn explicit_jwks_url_wins() {
        let cfg = config(&[
            DB,
            (SUPABASE_URL_ENV, "https://abc.supabase.co"),
            (JWKS_URL_ENV, "https://keys.example.com/jwks.json"),
        ])
        .unwrap();
        assert_eq!(
            cfg.auth.jwks_url.unwrap().as_str(),
            "https://keys.example.com/jwks.json"
        );
    }

    #[test]
    fn database_url_is_required() {
        let err = config(&[(JWT_SECRET_ENV, "s")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(DATABASE_URL_ENV)));
    }

    #[test]
    fn no_key_material_is_fatal() {
        assert!(matches!(
            config(&[DB]).unwrap_err(),
            ConfigError::NoAcceptedScheme
        ));
    }

    #[test]
    fn accepted_scheme_without_material_is_fatal() {
        let err = config(&[
            DB,
            (JWT_SECRET_ENV, "s"),
            (ACCEPTED_SCHEMES_ENV, "symmetric,asymmetric"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKeyMaterial {
                scheme: "asymmetric",
                ..
            }
        ));
    }

    #[test]
    fn explicit_scheme_restricts_trust() {
        let cfg = config(&[
            DB,
            (JWT_SECRET_ENV, "s"),
            (SUPABASE_URL_ENV, "https://abc.supabase.co"),
            (ACCEPTED_SCHEMES_ENV, "asymmetric"),
        ])
        .unwrap();
        assert_eq!(cfg.auth.accepted, AcceptedSchemes::ASYMMETRIC_ONLY);
        let verifier = cfg.auth.build_verifier().unwrap();
        assert!(verifier.key_cache().is_some());
    }

    #[test]
    fn plain_http_jwks_only_for_local_development() {
        assert!(config(&[DB, (JWKS_URL_ENV, "http://localhost:9999/jwks.json")]).is_ok());
        assert!(config(&[DB, (JWKS_URL_ENV, "http://keys.example.com/jwks.json")]).is_err());
        assert!(config(&[
            DB,
            (ENVIRONMENT_ENV, "production"),
            (JWKS_URL_ENV, "http://localhost:9999/jwks.json")
        ])
        .is_err());
    }

    #[test]
    fn port_falls_back_to_app_port() {
        let cfg = config(&[DB, (JWT_SECRET_ENV, "s"), (APP_PORT_ENV, "9000")]).unwrap();
        assert_eq!(cfg.port, 9000);

        let cfg = config(&[
            DB,
            (JWT_SECRET_ENV, "s"),
            (PORT_ENV, "7000"),
            (APP_PORT_ENV, "9000"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 7000);

        assert!(config(&[DB, (JWT_SECRET_ENV, "s"), (PORT_ENV, "http")]).is_err());
    }

    #[test]
    fn flags_and_formats_parse() {
        let cfg = config(&[
            DB,
            (JWT_SECRET_ENV, "s"),
            (RUN_MIGRATIONS_ENV, "true"),
            (LOG_FORMAT_ENV, "json"),
            (JWKS_TTL_ENV, "60"),
        ])
        .unwrap();
        assert!(cfg.run_migrations);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.auth.jwks_ttl, Duration::from_secs(60));

        assert!(config(&[DB, (JWT_SECRET_ENV, "s"), (JWKS_TTL_ENV, "0")]).is_err());
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let cfg = config(&[DB, (JWT_SECRET_ENV, "s"), (HOST_ENV, "127.0.0.1")]).unwrap();
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://app:hunter2@db/taskdesk"),
            (JWT_SECRET_ENV, "super-secret-value"),
        ])
        .unwrap();

        let printed = format!("{cfg:?}");
        assert!(!printed.contains("super-secret-value"));
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("accepted"));
    }
}
