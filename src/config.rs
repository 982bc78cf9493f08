// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] value built
//! from them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory of the redb database file | `/data` |
//! | `STORAGE_BACKEND` | `redb` or `memory` | `redb` |
//! | `JWT_SECRET` | HMAC signing secret for session tokens | Required (fixed secret with the `dev` feature) |
//! | `ACCESS_TOKEN_TTL_MINUTES` | Access token lifetime | `30` |
//! | `REFRESH_TOKEN_TTL_DAYS` | Refresh token lifetime | `7` |
//! | `LEDGER_MAX_RETRIES` | Optimistic retry budget for ledger writes | `32` |
//! | `DASHBOARD_RECENT_TRANSACTIONS` | Transactions shown on the dashboard | `10` |
//! | `SEED_ADMIN_USERNAME` / `SEED_ADMIN_PASSWORD` / `SEED_ADMIN_EMAIL` | Bootstrap admin when none exists | Unset |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS when both are set | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;

use crate::dashboard::DEFAULT_RECENT_TRANSACTIONS;
use crate::ledger::DEFAULT_MAX_RETRIES;
use crate::auth::tokens::{DEFAULT_ACCESS_TTL_MINUTES, DEFAULT_REFRESH_TTL_DAYS};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_MINUTES";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_DAYS";
pub const LEDGER_MAX_RETRIES_ENV: &str = "LEDGER_MAX_RETRIES";
pub const DASHBOARD_RECENT_ENV: &str = "DASHBOARD_RECENT_TRANSACTIONS";
pub const SEED_ADMIN_USERNAME_ENV: &str = "SEED_ADMIN_USERNAME";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "portal.redb";

/// Signing secret used by `dev` builds when `JWT_SECRET` is unset.
#[cfg(feature = "dev")]
const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redb,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Clone)]
pub struct SeedAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage_backend: StorageBackend,
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub ledger_max_retries: u32,
    pub dashboard_recent_transactions: usize,
    pub seed_admin: Option<SeedAdmin>,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("storage_backend", &self.storage_backend)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .field("ledger_max_retries", &self.ledger_max_retries)
            .field("dashboard_recent_transactions", &self.dashboard_recent_transactions)
            .field("seed_admin", &self.seed_admin.as_ref().map(|s| &s.username))
            .field("tls", &self.tls.is_some())
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage_backend = match var(STORAGE_BACKEND_ENV).as_deref() {
            None | Some("redb") => StorageBackend::Redb,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: STORAGE_BACKEND_ENV,
                    value: other.to_string(),
                })
            }
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let seed_admin = match (
            var(SEED_ADMIN_USERNAME_ENV),
            var(SEED_ADMIN_PASSWORD_ENV),
        ) {
            (Some(username), Some(password)) => Some(SeedAdmin {
                email: var(SEED_ADMIN_EMAIL_ENV)
                    .unwrap_or_else(|| format!("{username}@localhost.localdomain")),
                username,
                password,
            }),
            _ => None,
        };

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => None,
        };

        Ok(Self {
            host: var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&var, PORT_ENV, DEFAULT_PORT)?,
            data_dir: var(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            storage_backend,
            jwt_secret: jwt_secret(var(JWT_SECRET_ENV))?,
            access_ttl_minutes: positive(
                ACCESS_TOKEN_TTL_ENV,
                parse_or(&var, ACCESS_TOKEN_TTL_ENV, DEFAULT_ACCESS_TTL_MINUTES)?,
            )?,
            refresh_ttl_days: positive(
                REFRESH_TOKEN_TTL_ENV,
                parse_or(&var, REFRESH_TOKEN_TTL_ENV, DEFAULT_REFRESH_TTL_DAYS)?,
            )?,
            ledger_max_retries: positive(
                LEDGER_MAX_RETRIES_ENV,
                parse_or(&var, LEDGER_MAX_RETRIES_ENV, DEFAULT_MAX_RETRIES)?,
            )?,
            dashboard_recent_transactions: parse_or(
                &var,
                DASHBOARD_RECENT_ENV,
                DEFAULT_RECENT_TRANSACTIONS,
            )?,
            seed_admin,
            tls,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// In-memory configuration with a fixed secret.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::from_lookup(|name| match name {
            JWT_SECRET_ENV => Some("test-secret-with-enough-entropy".to_string()),
            STORAGE_BACKEND_ENV => Some("memory".to_string()),
            _ => None,
        })
        .expect("test configuration is valid")
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn positive<T: PartialOrd + Default + ToString>(name: &'static str, value: T) -> Result<T, ConfigError> {
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(not(feature = "dev"))]
fn jwt_secret(value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or(ConfigError::Missing(JWT_SECRET_ENV))
}

#[cfg(feature = "dev")]
fn jwt_secret(value: Option<String>) -> Result<String, ConfigError> {
    Ok(value.unwrap_or_else(|| {
        tracing::warn!("JWT_SECRET unset, using the insecure development secret");
        DEV_JWT_SECRET.to_string()
    }))
}
