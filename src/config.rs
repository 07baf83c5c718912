// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment
//! (Cloud Run secret bindings) and read once at startup.

use std::collections::BTreeSet;
use std::env;

/// Default lifetime of a signed photo URL (1 hour).
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
/// Default session credential lifetime.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
/// Default upper bound on an uploaded photo.
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Which managed-service implementations to wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Firestore, Identity Toolkit and Cloud Storage.
    Gcp,
    /// Process-local substitutes (local development and tests).
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// Managed-service backend selection
    pub backend: BackendKind,
    /// Identity Toolkit web API key (public)
    pub identity_api_key: String,
    /// Cloud Storage bucket holding progress photos
    pub photo_bucket: String,
    /// Service account email used as the signed URL credential
    pub photo_signing_email: Option<String>,
    /// Admin emails from static configuration
    pub admin_emails: BTreeSet<String>,
    /// Super-admin (developer tier) emails
    pub super_admin_emails: BTreeSet<String>,
    /// Session credential lifetime in hours
    pub session_ttl_hours: i64,
    /// Signed photo URL lifetime in seconds
    pub signed_url_ttl_secs: u64,
    /// Upload size cap for progress photos
    pub max_photo_bytes: usize,
    /// Honor the `X-View-Mode` header for super-admins
    pub view_mode_preview_enabled: bool,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// PEM-encoded PKCS#8 private key of the signing service account
    pub photo_signing_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let backend = match env::var("BACKEND")
            .unwrap_or_else(|_| "gcp".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "gcp" => BackendKind::Gcp,
            "memory" => BackendKind::Memory,
            _ => return Err(ConfigError::Invalid("BACKEND")),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-east1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            backend,
            identity_api_key: match backend {
                BackendKind::Gcp => env::var("IDENTITY_API_KEY")
                    .map(|v| v.trim().to_string())
                    .map_err(|_| ConfigError::Missing("IDENTITY_API_KEY"))?,
                BackendKind::Memory => env::var("IDENTITY_API_KEY").unwrap_or_default(),
            },
            photo_bucket: env::var("PHOTO_BUCKET")
                .unwrap_or_else(|_| "carter-care-progress-photos".to_string()),
            photo_signing_email: env::var("PHOTO_SIGNING_EMAIL").ok(),
            admin_emails: parse_email_list(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            super_admin_emails: parse_email_list(
                &env::var("SUPER_ADMIN_EMAILS").unwrap_or_default(),
            ),
            session_ttl_hours: parse_or("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            signed_url_ttl_secs: parse_or("SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS)?,
            max_photo_bytes: parse_or("MAX_PHOTO_BYTES", DEFAULT_MAX_PHOTO_BYTES)?,
            view_mode_preview_enabled: parse_or("VIEW_MODE_PREVIEW_ENABLED", false)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            photo_signing_key: env::var("PHOTO_SIGNING_KEY").ok(),
        })
    }

    /// Config for tests: in-memory backends, one admin and one super-admin.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-east1".to_string(),
            port: 8080,
            backend: BackendKind::Memory,
            identity_api_key: String::new(),
            photo_bucket: "test-bucket".to_string(),
            photo_signing_email: None,
            admin_emails: parse_email_list("admin@example.com"),
            super_admin_emails: parse_email_list("dev@example.com"),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
            view_mode_preview_enabled: true,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            photo_signing_key: None,
        }
    }
}

/// Normalize an email for comparisons: trimmed and ASCII-lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Parse a comma-separated list of emails, dropping blanks.
pub fn parse_email_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .collect()
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
