// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session credentials: sign-up, sign-in, sign-out and per-request checks.
//!
//! A session credential is an HS256 JWT (`sub`, `email`, `sid`, `iat`,
//! `exp`) backed by a `sessions/{sid}` row. The credential is honored only
//! while its row exists, so deleting the row revokes it.
//!
//! Lockdown and disabled checks run at sign-in and again on every request.
//! A store failure while reading either flag is logged and does not block
//! access.

use crate::config::{normalize_email, Config};
use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::SessionRecord;
use crate::services::identity::IdentityProvider;
use crate::services::password::check_password_policy;
use crate::time_utils::format_utc_rfc3339;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// Session JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity provider local id)
    pub sub: String,
    /// Normalized email
    pub email: String,
    /// Session row id
    pub sid: String,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
}

/// Sign-up request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

/// Issued session credential.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub expires_at: String,
}

/// Why a session was refused by the access checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Denial {
    Lockdown,
    Disabled,
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Lockdown => AppError::PlatformLockdown,
            Denial::Disabled => AppError::AccountDisabled,
        }
    }
}

/// Issues and validates session credentials.
#[derive(Clone)]
pub struct SessionManager {
    db: FirestoreDb,
    identity: IdentityProvider,
    signing_key: Vec<u8>,
    ttl_hours: i64,
    super_admin_emails: BTreeSet<String>,
}

impl SessionManager {
    pub fn new(db: FirestoreDb, identity: IdentityProvider, config: &Config) -> Self {
        Self {
            db,
            identity,
            signing_key: config.jwt_signing_key.clone(),
            ttl_hours: config.session_ttl_hours,
            super_admin_emails: config.super_admin_emails.clone(),
        }
    }

    /// Create a provider account after local validation.
    pub async fn sign_up(&self, mut req: SignUpRequest) -> Result<()> {
        req.email = normalize_email(&req.email);
        req.validate()?;
        check_password_policy(&req.password).map_err(|e| e.into_app_error("password"))?;

        let email = req.email;
        let account = self
            .identity
            .sign_up(&email, &req.password, req.name.trim())
            .await?;

        tracing::info!(user_id = %account.local_id, email = %email, "User signed up");
        Ok(())
    }

    /// Verify credentials, issue a session, then apply lockdown/disabled checks.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionCredential> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::validation("email", "Email and password are required"));
        }

        let account = self.identity.sign_in(&email, password).await?;
        let credential = self
            .issue(&account.local_id, &account.email, &account.display_name)
            .await?;

        if let Some(denial) = self.check_access(&account.email).await {
            tracing::info!(
                user_id = %account.local_id,
                email = %account.email,
                reason = ?denial,
                "Sign-in refused after session issue"
            );
            self.revoke(&credential.session_id, &account.local_id).await;
            return Err(denial.into());
        }

        if let Err(e) = self
            .db
            .record_login(&account.email, &account.local_id, &account.display_name)
            .await
        {
            tracing::warn!(
                user_id = %account.local_id,
                error = %e,
                "Profile update failed, revoking new session"
            );
            self.revoke(&credential.session_id, &account.local_id).await;
            return Err(e);
        }

        tracing::info!(user_id = %account.local_id, email = %account.email, "User signed in");
        Ok(credential)
    }

    /// Delete the session row and revoke provider tokens.
    pub async fn sign_out(&self, claims: &Claims) -> Result<()> {
        self.db.delete_session(&claims.sid).await?;
        if let Err(e) = self.identity.revoke_sessions(&claims.sub).await {
            tracing::warn!(user_id = %claims.sub, error = %e, "Token revocation failed on sign-out");
        }
        tracing::info!(user_id = %claims.sub, "User signed out");
        Ok(())
    }

    /// Verify a session token and confirm its row still exists.
    pub async fn get_credentials(&self, token: &str) -> Result<Claims> {
        let key = DecodingKey::from_secret(&self.signing_key);
        let validation = Validation::new(Algorithm::HS256);

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|_| AppError::InvalidToken)?
            .claims;

        let session = self
            .db
            .get_session(&claims.sid)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if session.user_id != claims.sub {
            tracing::warn!(sid = %claims.sid, "Session row does not match token subject");
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }

    /// Re-run lockdown/disabled checks for an active session. A hit
    /// revokes the session.
    pub async fn check_session(&self, claims: &Claims) -> Result<()> {
        if let Some(denial) = self.check_access(&claims.email).await {
            tracing::info!(
                user_id = %claims.sub,
                email = %claims.email,
                reason = ?denial,
                "Active session revoked"
            );
            self.revoke(&claims.sid, &claims.sub).await;
            return Err(denial.into());
        }
        Ok(())
    }

    async fn issue(&self, user_id: &str, email: &str, name: &str) -> Result<SessionCredential> {
        let now = chrono::Utc::now();
        let expires = now + chrono::Duration::hours(self.ttl_hours);
        let session_id = uuid::Uuid::new_v4().to_string();

        self.db
            .create_session(&SessionRecord {
                session_id: session_id.clone(),
                user_id: user_id.to_string(),
                email: email.to_string(),
                created_at: format_utc_rfc3339(now),
                expires_at: format_utc_rfc3339(expires),
            })
            .await?;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            sid: session_id.clone(),
            iat: now.timestamp() as usize,
            exp: expires.timestamp() as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

        Ok(SessionCredential {
            token,
            session_id,
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            expires_at: format_utc_rfc3339(expires),
        })
    }

    /// Lockdown (unless super-admin), then disabled. Read failures fail open.
    async fn check_access(&self, email: &str) -> Option<Denial> {
        if !self.super_admin_emails.contains(email) {
            match self.db.get_lockdown().await {
                Ok(lockdown) if lockdown.enabled => return Some(Denial::Lockdown),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(email, error = %e, "Lockdown check failed, allowing access");
                }
            }
        }

        match self.db.get_profile(email).await {
            Ok(Some(profile)) if profile.disabled => Some(Denial::Disabled),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(email, error = %e, "Disabled check failed, allowing access");
                None
            }
        }
    }

    /// Best-effort: drop the session row and revoke provider tokens.
    async fn revoke(&self, session_id: &str, user_id: &str) {
        if let Err(e) = self.db.delete_session(session_id).await {
            tracing::warn!(user_id, error = %e, "Failed to delete session row");
        }
        if let Err(e) = self.identity.revoke_sessions(user_id).await {
            tracing::warn!(user_id, error = %e, "Failed to revoke provider tokens");
        }
    }
}
