// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup and shared read-only through `AppState`. Signing
//! secrets and media host credentials are never read anywhere else.

use chrono::Duration;
use std::env;
use std::path::PathBuf;

const DEFAULT_ACCESS_TOKEN_EXPIRY: &str = "15m";
const DEFAULT_REFRESH_TOKEN_EXPIRY: &str = "10d";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound for any token lifetime.
const MAX_TOKEN_LIFETIME_DAYS: i64 = 365;

/// Credentials for the remote media host.
#[derive(Debug, Clone)]
pub struct MediaHostConfig {
    /// Upload API base URL (no trailing slash)
    pub api_base: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Use the in-process document store instead of Firestore (local dev)
    pub use_in_memory_store: bool,
    /// Server port
    pub port: u16,
    /// Directory where multipart uploads are spooled before being sent on
    pub upload_dir: PathBuf,
    /// Maximum accepted request body size
    pub max_upload_bytes: usize,

    // --- Secrets ---
    /// HMAC key for access tokens (raw bytes)
    pub access_token_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    /// HMAC key for refresh tokens (raw bytes)
    pub refresh_token_secret: Vec<u8>,
    pub refresh_token_ttl: Duration,
    pub media: MediaHostConfig,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            use_in_memory_store: env::var("USE_IN_MEMORY_STORE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT"))?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("account-api-uploads")),
            max_upload_bytes: match env::var("MAX_UPLOAD_BYTES") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| ConfigError::Invalid("MAX_UPLOAD_BYTES"))?,
                Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            },

            access_token_secret: required_secret("ACCESS_TOKEN_SECRET")?.into_bytes(),
            access_token_ttl: duration_var("ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_EXPIRY)?,
            refresh_token_secret: required_secret("REFRESH_TOKEN_SECRET")?.into_bytes(),
            refresh_token_ttl: duration_var("REFRESH_TOKEN_EXPIRY", DEFAULT_REFRESH_TOKEN_EXPIRY)?,
            media: MediaHostConfig {
                api_base: env::var("CLOUDINARY_API_BASE")
                    .unwrap_or_else(|_| "https://api.cloudinary.com".to_string()),
                cloud_name: required_secret("CLOUDINARY_CLOUD_NAME")?,
                api_key: required_secret("CLOUDINARY_API_KEY")?,
                api_secret: required_secret("CLOUDINARY_API_SECRET")?,
            },
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            use_in_memory_store: true,
            port: 8080,
            upload_dir: env::temp_dir().join("account-api-test-uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            access_token_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_secret: b"test_refresh_secret_32_bytes_mn!".to_vec(),
            refresh_token_ttl: Duration::days(10),
            media: MediaHostConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                cloud_name: "test-cloud".to_string(),
                api_key: "test-key".to_string(),
                api_secret: "test-secret".to_string(),
            },
        }
    }
}

fn required_secret(name: &'static str) -> Result<String, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.to_string())
}

fn duration_var(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).ok_or(ConfigError::Invalid(name))
}

/// Parse `"90"`, `"15m"`, `"12h"`, `"10d"` or `"2w"` into a positive duration
/// of at most a year.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: i64 = digits.parse().ok()?;
    if n <= 0 {
        return None;
    }
    let duration = match unit {
        "" | "s" => Duration::try_seconds(n),
        "m" => Duration::try_minutes(n),
        "h" => Duration::try_hours(n),
        "d" => Duration::try_days(n),
        "w" => Duration::try_weeks(n),
        _ => None,
    }?;
    (duration <= Duration::days(MAX_TOKEN_LIFETIME_DAYS)).then_some(duration)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
