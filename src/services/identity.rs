// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client (email/password accounts).
//!
//! Handles:
//! - Account creation and password sign-in (Identity Toolkit public API)
//! - Admin password resets and refresh-token revocation (project-scoped API)
//! - An in-memory account directory for local runs and tests

use crate::config::{normalize_email, Config};
use crate::error::AppError;
use crate::services::gcp_auth::GcpTokenProvider;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccount {
    /// Provider subject id; becomes the owner id of every entry
    pub local_id: String,
    pub email: String,
    pub display_name: String,
}

/// Identity provider handle. Cheap to clone.
#[derive(Clone)]
pub struct IdentityProvider {
    backend: IdentityBackend,
}

#[derive(Clone)]
enum IdentityBackend {
    Toolkit(Arc<ToolkitClient>),
    Memory(Arc<MemoryAccounts>),
}

impl IdentityProvider {
    /// Identity Toolkit client. Honors FIREBASE_AUTH_EMULATOR_HOST.
    pub fn toolkit(config: &Config, tokens: Arc<GcpTokenProvider>) -> Self {
        let emulator_host = std::env::var("FIREBASE_AUTH_EMULATOR_HOST").ok();
        let base_url = match &emulator_host {
            Some(host) => format!("http://{}/identitytoolkit.googleapis.com/v1", host),
            None => IDENTITY_TOOLKIT_URL.to_string(),
        };

        if emulator_host.is_some() {
            tracing::info!(base_url = %base_url, "Using Identity Toolkit emulator");
        }

        Self {
            backend: IdentityBackend::Toolkit(Arc::new(ToolkitClient {
                http: reqwest::Client::new(),
                base_url,
                api_key: config.identity_api_key.clone(),
                project_id: config.gcp_project_id.clone(),
                tokens,
            })),
        }
    }

    /// Process-local account directory.
    pub fn in_memory() -> Self {
        Self {
            backend: IdentityBackend::Memory(Arc::new(MemoryAccounts::default())),
        }
    }

    /// Create an account. An existing email is a `Conflict`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<ProviderAccount, AppError> {
        match &self.backend {
            IdentityBackend::Toolkit(client) => client.sign_up(email, password, display_name).await,
            IdentityBackend::Memory(accounts) => accounts.sign_up(email, password, display_name),
        }
    }

    /// Verify email/password. Any rejection is `AuthenticationFailed`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderAccount, AppError> {
        match &self.backend {
            IdentityBackend::Toolkit(client) => client.sign_in(email, password).await,
            IdentityBackend::Memory(accounts) => accounts.sign_in(email, password),
        }
    }

    /// Set a new password for `local_id` (admin operation).
    pub async fn set_password(&self, local_id: &str, password: &str) -> Result<(), AppError> {
        match &self.backend {
            IdentityBackend::Toolkit(client) => {
                client
                    .admin_update(&AdminUpdateRequest {
                        local_id,
                        password: Some(password),
                        valid_since: None,
                    })
                    .await
            }
            IdentityBackend::Memory(accounts) => accounts.set_password(local_id, password),
        }
    }

    /// Invalidate every refresh token issued to `local_id` before now.
    pub async fn revoke_sessions(&self, local_id: &str) -> Result<(), AppError> {
        let now = chrono::Utc::now().timestamp();
        match &self.backend {
            IdentityBackend::Toolkit(client) => {
                client
                    .admin_update(&AdminUpdateRequest {
                        local_id,
                        password: None,
                        valid_since: Some(now.to_string()),
                    })
                    .await
            }
            IdentityBackend::Memory(accounts) => accounts.revoke(local_id, now),
        }
    }

    /// Revocation timestamp recorded by the in-memory directory.
    pub fn revoked_since(&self, local_id: &str) -> Option<i64> {
        match &self.backend {
            IdentityBackend::Toolkit(_) => None,
            IdentityBackend::Memory(accounts) => accounts.revoked_since(local_id),
        }
    }
}

// ─── Identity Toolkit REST ─────────────────────────────────────

struct ToolkitClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: String,
    tokens: Arc<GcpTokenProvider>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminUpdateRequest<'a> {
    local_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_since: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ToolkitErrorEnvelope {
    error: ToolkitError,
}

#[derive(Debug, Deserialize)]
struct ToolkitError {
    #[serde(default)]
    message: String,
}

impl ToolkitClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<ProviderAccount, AppError> {
        let url = format!("{}/accounts:signUp", self.base_url);
        let body = PasswordRequest {
            email,
            password,
            display_name: Some(display_name),
            return_secure_token: true,
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Sign-up request failed: {}", e)))?;

        let account: AccountResponse = check_response_json(response).await?;
        tracing::info!(local_id = %account.local_id, "Identity account created");

        Ok(ProviderAccount {
            local_id: account.local_id,
            email: normalize_email(email),
            display_name: display_name.to_string(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderAccount, AppError> {
        let url = format!("{}/accounts:signInWithPassword", self.base_url);
        let body = PasswordRequest {
            email,
            password,
            display_name: None,
            return_secure_token: true,
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Sign-in request failed: {}", e)))?;

        let account: AccountResponse = check_response_json(response).await?;

        Ok(ProviderAccount {
            local_id: account.local_id,
            email: normalize_email(if account.email.is_empty() {
                email
            } else {
                &account.email
            }),
            display_name: account.display_name,
        })
    }

    /// POST projects/{project}/accounts:update with service credentials.
    async fn admin_update(&self, body: &AdminUpdateRequest<'_>) -> Result<(), AppError> {
        let url = format!(
            "{}/projects/{}/accounts:update",
            self.base_url, self.project_id
        );

        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| AppError::Identity(format!("No service credentials: {:#}", e)))?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Account update request failed: {}", e)))?;

        let _: serde_json::Value = check_response_json(response).await?;
        Ok(())
    }
}

/// Map a non-success Identity Toolkit response onto `AppError`.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Invalid response body: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ToolkitErrorEnvelope>(&body)
        .map(|env| env.error.message)
        .unwrap_or_default();

    Err(map_toolkit_error(status.as_u16(), &message, &body))
}

/// Error messages look like `WEAK_PASSWORD : Password should be ...`.
fn map_toolkit_error(status: u16, message: &str, body: &str) -> AppError {
    let code = message.split(" : ").next().unwrap_or_default().trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AppError::AuthenticationFailed
        }
        "USER_DISABLED" => AppError::AccountDisabled,
        "EMAIL_EXISTS" => AppError::Conflict("An account with this email already exists".into()),
        "WEAK_PASSWORD" => AppError::validation("password", "Password is too weak"),
        "INVALID_EMAIL" => AppError::validation("email", "Invalid email address"),
        "USER_NOT_FOUND" => AppError::NotFound("User not found".into()),
        _ => AppError::Identity(format!("HTTP {}: {}", status, body)),
    }
}

// ─── In-memory directory ───────────────────────────────────────

struct MemoryAccount {
    local_id: String,
    email: String,
    display_name: String,
    salt: String,
    password_hash: [u8; 32],
    revoked_since: Option<i64>,
}

#[derive(Default)]
struct MemoryAccounts {
    /// Keyed by normalized email
    accounts: DashMap<String, MemoryAccount>,
}

fn hash_password(salt: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

impl MemoryAccounts {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<ProviderAccount, AppError> {
        let email = normalize_email(email);
        match self.accounts.entry(email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(
                "An account with this email already exists".into(),
            )),
            Entry::Vacant(slot) => {
                let salt = uuid::Uuid::new_v4().to_string();
                let account = MemoryAccount {
                    local_id: uuid::Uuid::new_v4().simple().to_string(),
                    email: email.clone(),
                    display_name: display_name.to_string(),
                    password_hash: hash_password(&salt, password),
                    salt,
                    revoked_since: None,
                };
                let created = ProviderAccount {
                    local_id: account.local_id.clone(),
                    email,
                    display_name: account.display_name.clone(),
                };
                slot.insert(account);
                Ok(created)
            }
        }
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<ProviderAccount, AppError> {
        let email = normalize_email(email);
        let account = self
            .accounts
            .get(&email)
            .ok_or(AppError::AuthenticationFailed)?;

        let candidate = hash_password(&account.salt, password);
        if !bool::from(candidate.as_slice().ct_eq(account.password_hash.as_slice())) {
            return Err(AppError::AuthenticationFailed);
        }

        Ok(ProviderAccount {
            local_id: account.local_id.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
        })
    }

    fn set_password(&self, local_id: &str, password: &str) -> Result<(), AppError> {
        let mut account = self
            .accounts
            .iter_mut()
            .find(|a| a.local_id == local_id)
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let salt = uuid::Uuid::new_v4().to_string();
        account.password_hash = hash_password(&salt, password);
        account.salt = salt;
        Ok(())
    }

    fn revoke(&self, local_id: &str, now: i64) -> Result<(), AppError> {
        let mut account = self
            .accounts
            .iter_mut()
            .find(|a| a.local_id == local_id)
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        account.revoked_since = Some(now);
        Ok(())
    }

    fn revoked_since(&self, local_id: &str) -> Option<i64> {
        self.accounts
            .iter()
            .find(|a| a.local_id == local_id)
            .and_then(|a| a.revoked_since)
    }
}
