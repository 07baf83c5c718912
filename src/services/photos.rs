// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress photo storage (Cloud Storage) and V4 signed URLs.
//!
//! Photos are stored under `progress/{owner_id}/{entry_id}.{ext}`, so a
//! record's key alone is enough to fetch or delete its photo.

use crate::config::Config;
use crate::error::AppError;
use crate::services::gcp_auth::GcpTokenProvider;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const STORAGE_HOST: &str = "storage.googleapis.com";
/// Longest lifetime Cloud Storage accepts for a V4 signed URL (7 days).
pub const MAX_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Upload body chunk size; progress is reported once per chunk.
const UPLOAD_CHUNK_BYTES: usize = 256 * 1024;

/// File extensions accepted for progress photos.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "webp", "gif", "heic", "heif", "bmp", "tiff", "tif", "svg",
];

/// Upload progress callback, called with a percentage (0-100).
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Time-limited GET URL for a stored photo.
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: String,
}

/// Object key for a progress photo.
pub fn photo_key(owner_id: &str, entry_id: &str, extension: &str) -> String {
    format!("progress/{}/{}.{}", owner_id, entry_id, extension)
}

/// Validate an upload and return its normalized extension.
pub fn validate_photo(
    file_name: &str,
    content_type: &str,
    len: usize,
    max_bytes: usize,
) -> Result<String, AppError> {
    if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(AppError::validation("photo", "File must be an image"));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| AppError::validation("photo", "Unsupported image file extension"))?;

    if len == 0 {
        return Err(AppError::validation("photo", "Photo is empty"));
    }
    if len > max_bytes {
        return Err(AppError::validation(
            "photo",
            format!("Photo exceeds the {} byte limit", max_bytes),
        ));
    }

    Ok(extension)
}

/// Progress photo store. Cheap to clone.
#[derive(Clone)]
pub struct PhotoStore {
    backend: PhotoBackend,
    max_bytes: usize,
    default_ttl_secs: u64,
}

#[derive(Clone)]
enum PhotoBackend {
    Gcs(Arc<GcsClient>),
    Memory(Arc<MemoryObjects>),
}

impl PhotoStore {
    /// Cloud Storage backend. URL signing needs PHOTO_SIGNING_EMAIL and
    /// PHOTO_SIGNING_KEY; without them uploads work but signing fails.
    pub fn gcs(config: &Config, tokens: Arc<GcpTokenProvider>) -> anyhow::Result<Self> {
        let signer = match (&config.photo_signing_email, &config.photo_signing_key) {
            (Some(email), Some(pem)) => Some(UrlSigner {
                email: email.clone(),
                key_pair: parse_pkcs8_pem(pem)?,
            }),
            _ => {
                tracing::warn!("Photo URL signing credentials not configured");
                None
            }
        };

        Ok(Self {
            backend: PhotoBackend::Gcs(Arc::new(GcsClient {
                http: reqwest::Client::new(),
                bucket: config.photo_bucket.clone(),
                tokens,
                signer,
            })),
            max_bytes: config.max_photo_bytes,
            default_ttl_secs: config.signed_url_ttl_secs,
        })
    }

    /// Process-local object store.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            backend: PhotoBackend::Memory(Arc::new(MemoryObjects {
                bucket: config.photo_bucket.clone(),
                objects: DashMap::new(),
                url_key: uuid::Uuid::new_v4().as_bytes().to_vec(),
                fail_deletes: AtomicBool::new(false),
            })),
            max_bytes: config.max_photo_bytes,
            default_ttl_secs: config.signed_url_ttl_secs,
        }
    }

    /// Validate and upload a photo, returning its key.
    pub async fn upload(
        &self,
        owner_id: &str,
        entry_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        on_progress: ProgressFn,
    ) -> Result<String, AppError> {
        let extension = validate_photo(file_name, content_type, bytes.len(), self.max_bytes)?;
        let key = photo_key(owner_id, entry_id, &extension);

        match &self.backend {
            PhotoBackend::Gcs(client) => {
                client.upload(&key, content_type, bytes, on_progress).await?
            }
            PhotoBackend::Memory(objects) => {
                let total = bytes.len();
                let mut sent = 0;
                for chunk in bytes.chunks(UPLOAD_CHUNK_BYTES) {
                    sent += chunk.len();
                    on_progress(percent(sent, total));
                }
                objects.objects.insert(key.clone(), bytes);
            }
        }

        tracing::info!(owner_id, entry_id, key = %key, "Photo uploaded");
        Ok(key)
    }

    /// Delete a photo. Deleting a missing object succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        match &self.backend {
            PhotoBackend::Gcs(client) => client.delete(key).await?,
            PhotoBackend::Memory(objects) => {
                if objects.fail_deletes.load(Ordering::SeqCst) {
                    return Err(AppError::Storage(format!(
                        "simulated delete failure for {}",
                        key
                    )));
                }
                objects.objects.remove(key);
            }
        }
        tracing::debug!(key, "Photo deleted");
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, AppError> {
        match &self.backend {
            PhotoBackend::Gcs(client) => client.exists(key).await,
            PhotoBackend::Memory(objects) => Ok(objects.objects.contains_key(key)),
        }
    }

    /// Make in-memory deletes fail. No effect on Cloud Storage.
    pub fn simulate_delete_failures(&self, on: bool) {
        if let PhotoBackend::Memory(objects) = &self.backend {
            objects.fail_deletes.store(on, Ordering::SeqCst);
        }
    }

    #[cfg(test)]
    pub(crate) fn stored_keys(&self) -> Vec<String> {
        match &self.backend {
            PhotoBackend::Gcs(_) => Vec::new(),
            PhotoBackend::Memory(objects) => {
                objects.objects.iter().map(|o| o.key().clone()).collect()
            }
        }
    }

    /// Issue a signed GET URL. The object must exist.
    ///
    /// `ttl_secs` defaults to the configured lifetime and is clamped to 7 days.
    pub async fn signed_url(&self, key: &str, ttl_secs: Option<u64>) -> Result<SignedUrl, AppError> {
        if !self.exists(key).await? {
            return Err(AppError::NotFound(format!("Photo {}", key)));
        }

        let ttl = ttl_secs
            .unwrap_or(self.default_ttl_secs)
            .clamp(1, MAX_SIGNED_URL_TTL_SECS);
        let now = Utc::now();
        let expires_at = crate::time_utils::format_utc_rfc3339(
            now + chrono::Duration::seconds(ttl as i64),
        );

        let url = match &self.backend {
            PhotoBackend::Gcs(client) => {
                let signer = client.signer.as_ref().ok_or_else(|| {
                    AppError::Storage("Photo URL signing is not configured".to_string())
                })?;
                build_v4_signed_url(&client.bucket, key, &signer.email, now, ttl, |payload| {
                    signer.sign(payload)
                })?
            }
            PhotoBackend::Memory(objects) => objects.signed_url(key, now, ttl)?,
        };

        Ok(SignedUrl { url, expires_at })
    }
}

fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        ((sent as u128 * 100) / total as u128) as u8
    }
}

// ─── Cloud Storage JSON API ────────────────────────────────────

struct UrlSigner {
    email: String,
    key_pair: RsaKeyPair,
}

impl UrlSigner {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, AppError> {
        let rng = ring::rand::SystemRandom::new();
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &rng, payload, &mut signature)
            .map_err(|_| AppError::Storage("RSA signing failed".to_string()))?;
        Ok(signature)
    }
}

struct GcsClient {
    http: reqwest::Client,
    bucket: String,
    tokens: Arc<GcpTokenProvider>,
    signer: Option<UrlSigner>,
}

impl GcsClient {
    async fn token(&self) -> Result<String, AppError> {
        self.tokens
            .access_token()
            .await
            .map_err(|e| AppError::Storage(format!("No service credentials: {:#}", e)))
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}/storage/v1/b/{}/o/{}",
            STORAGE_HOST,
            self.bucket,
            urlencoding::encode(key)
        )
    }

    /// Simple media upload with a chunked body so progress tracks the send.
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
        on_progress: ProgressFn,
    ) -> Result<(), AppError> {
        let url = format!(
            "https://{}/upload/storage/v1/b/{}/o",
            STORAGE_HOST, self.bucket
        );

        let total = bytes.len();
        let chunks: Vec<Vec<u8>> = bytes
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(|c| c.to_vec())
            .collect();
        let mut sent = 0usize;
        let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            on_progress(percent(sent, total));
            Ok::<_, std::io::Error>(chunk)
        }));

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token().await?)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Upload request failed: {}", e)))?;

        check_response(response).await
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.object_url(key))
            .bearer_auth(self.token().await?)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Delete request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_response(response).await
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let response = self
            .http
            .get(self.object_url(key))
            .bearer_auth(self.token().await?)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Metadata request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_response(response).await?;
        Ok(true)
    }
}

async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Storage(format!("HTTP {}: {}", status, body)))
}

/// Decode a PEM PKCS#8 private key. Accepts literal `\n` escapes as found
/// in service account JSON pasted into an environment variable.
fn parse_pkcs8_pem(pem: &str) -> anyhow::Result<RsaKeyPair> {
    let pem = pem.replace("\\n", "\n");
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid PEM base64: {}", e))?;
    RsaKeyPair::from_pkcs8(&der).map_err(|e| anyhow::anyhow!("invalid PKCS#8 RSA key: {}", e))
}

/// Encode an object name for a canonical URI, keeping `/` separators.
fn encode_object_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build a V4 (GOOG4-RSA-SHA256) signed GET URL.
///
/// `sign` receives the string-to-sign and returns the raw RSA signature.
pub fn build_v4_signed_url<F>(
    bucket: &str,
    key: &str,
    signer_email: &str,
    now: DateTime<Utc>,
    ttl_secs: u64,
    sign: F,
) -> Result<String, AppError>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, AppError>,
{
    let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{}/auto/storage/goog4_request", date);
    let credential = format!("{}/{}", signer_email, scope);

    let canonical_uri = format!("/{}/{}", bucket, encode_object_path(key));

    // Already in sorted order.
    let canonical_query = [
        ("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_string()),
        ("X-Goog-Credential", credential),
        ("X-Goog-Date", datetime.clone()),
        ("X-Goog-Expires", ttl_secs.to_string()),
        ("X-Goog-SignedHeaders", "host".to_string()),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
    .collect::<Vec<_>>()
    .join("&");

    let canonical_request = format!(
        "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
        canonical_uri, canonical_query, STORAGE_HOST
    );

    let string_to_sign = format!(
        "GOOG4-RSA-SHA256\n{}\n{}\n{}",
        datetime,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signature = sign(string_to_sign.as_bytes())?;

    Ok(format!(
        "https://{}{}?{}&X-Goog-Signature={}",
        STORAGE_HOST,
        canonical_uri,
        canonical_query,
        hex::encode(signature)
    ))
}

// ─── In-memory objects ─────────────────────────────────────────

struct MemoryObjects {
    bucket: String,
    objects: DashMap<String, Vec<u8>>,
    url_key: Vec<u8>,
    fail_deletes: AtomicBool,
}

impl MemoryObjects {
    fn signed_url(&self, key: &str, now: DateTime<Utc>, ttl: u64) -> Result<String, AppError> {
        let expires = now.timestamp() + ttl as i64;
        let mut mac = HmacSha256::new_from_slice(&self.url_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(format!("{}|{}", key, expires).as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "memory://{}/{}?expires={}&signature={}",
            self.bucket,
            encode_object_path(key),
            expires,
            signature
        ))
    }
}
