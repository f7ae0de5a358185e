//! Configuration management for Identity Service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("JWT issuer: {}", settings.jwt.issuer);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use crypto_core::jwt::DEFAULT_VALIDATION_LEEWAY;
use crypto_core::{KeyMaterial, SigningAlgorithm, ValidationPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Fallback lifetime for access and refresh tokens (hours)
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Longest accepted token lifetime (hours, 100 years)
pub const MAX_TOKEN_TTL_HOURS: i64 = 100 * 365 * 24;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// A `.env` file is read first in debug builds.
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Self::from_source(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup.
    pub fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Settings {
            database: DatabaseSettings::from_source(&get)?,
            jwt: JwtSettings::from_source(&get)?,
            server: ServerSettings::from_source(&get)?,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .unwrap_or_else(|| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {}", key))
}

fn non_empty<F>(get: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).filter(|value| !value.trim().is_empty())
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_source<F>(get: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: non_empty(get, "DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_or(get, "DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: parse_or(get, "DATABASE_MIN_CONNECTIONS", "2")?,
            acquire_timeout: parse_or(get, "DATABASE_ACQUIRE_TIMEOUT", "5")?,
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API; empty means none.
    pub cors_allowed_origins: Vec<String>,
}

impl ServerSettings {
    fn from_source<F>(get: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = get("SERVER_PORT")
            .or_else(|| get("PORT"))
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Token signing settings
///
/// Key values are never printed by the `Debug` impl.
#[derive(Clone)]
pub struct JwtSettings {
    pub algorithm: SigningAlgorithm,
    pub secret: Option<String>,
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_hours: i64,
    pub leeway_secs: u64,
    pub token_type: String,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("private_key_pem", &self.private_key_pem.as_ref().map(|_| "<redacted>"))
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("private_key_path", &self.private_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_hours", &self.access_token_ttl_hours)
            .field("refresh_token_ttl_hours", &self.refresh_token_ttl_hours)
            .field("leeway_secs", &self.leeway_secs)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl JwtSettings {
    fn from_source<F>(get: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let algorithm = get("JWT_ALGORITHM")
            .unwrap_or_else(|| "HS256".to_string())
            .parse::<SigningAlgorithm>()
            .context("Invalid JWT_ALGORITHM")?;

        Ok(Self {
            algorithm,
            secret: non_empty(get, "JWT_SECRET"),
            // PEMs passed through env files often carry literal "\n".
            private_key_pem: non_empty(get, "JWT_PRIVATE_KEY").map(|pem| pem.replace("\\n", "\n")),
            public_key_pem: non_empty(get, "JWT_PUBLIC_KEY").map(|pem| pem.replace("\\n", "\n")),
            private_key_path: non_empty(get, "JWT_PRIVATE_KEY_PATH").map(PathBuf::from),
            public_key_path: non_empty(get, "JWT_PUBLIC_KEY_PATH").map(PathBuf::from),
            issuer: non_empty(get, "JWT_ISSUER").unwrap_or_else(|| "identity-service".to_string()),
            audience: non_empty(get, "JWT_AUDIENCE").unwrap_or_else(|| "api".to_string()),
            access_token_ttl_hours: ttl_hours(get, "JWT_EXPIRATION_HOUR"),
            refresh_token_ttl_hours: ttl_hours(get, "JWT_REFRESH_TOKEN_EXPIRATION_HOUR"),
            leeway_secs: parse_or(
                get,
                "JWT_LEEWAY_SECONDS",
                &DEFAULT_VALIDATION_LEEWAY.to_string(),
            )?,
            token_type: non_empty(get, "TOKEN_TYPE").unwrap_or_else(|| "Bearer".to_string()),
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::hours(self.access_token_ttl_hours)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::hours(self.refresh_token_ttl_hours)
    }

    /// Exact prefix expected in the `Authorization` header.
    pub fn bearer_prefix(&self) -> String {
        format!("{} ", self.token_type)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy::new(self.issuer.clone(), self.audience.clone())
            .with_leeway(self.leeway_secs)
    }

    /// Resolve signing keys for the configured algorithm.
    ///
    /// Inline PEMs win over file paths. The service issues tokens, so a
    /// private key is required for RS256.
    pub fn key_material(&self) -> Result<KeyMaterial> {
        match self.algorithm {
            SigningAlgorithm::Hs256 => {
                let secret = self
                    .secret
                    .as_ref()
                    .ok_or_else(|| anyhow!("JWT_SECRET must be set for HS256"))?;
                Ok(KeyMaterial::shared_secret(secret.as_bytes())?)
            }
            SigningAlgorithm::Rs256 => {
                let material = match (&self.private_key_pem, &self.public_key_pem) {
                    (Some(private_pem), Some(public_pem)) => {
                        KeyMaterial::rsa_key_pair(private_pem.as_bytes(), public_pem.as_bytes())
                    }
                    _ => {
                        let public_path = self.public_key_path.as_deref().ok_or_else(|| {
                            anyhow!("JWT_PUBLIC_KEY or JWT_PUBLIC_KEY_PATH must be set for RS256")
                        })?;
                        KeyMaterial::rsa_from_files(self.private_key_path.as_deref(), public_path)?
                    }
                };

                if !material.can_sign() {
                    return Err(anyhow!(
                        "JWT_PRIVATE_KEY or JWT_PRIVATE_KEY_PATH must be set for RS256"
                    ));
                }
                Ok(material)
            }
        }
    }
}

fn ttl_hours<F>(get: &F, key: &str) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => DEFAULT_TOKEN_TTL_HOURS,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(hours) if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) => hours,
            _ => {
                warn!(
                    key,
                    value = %raw,
                    default = DEFAULT_TOKEN_TTL_HOURS,
                    "Invalid token lifetime, using default"
                );
                DEFAULT_TOKEN_TTL_HOURS
            }
        },
    }
}
