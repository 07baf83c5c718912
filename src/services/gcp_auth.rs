// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth access tokens for Google REST APIs (Identity Toolkit admin calls,
//! Cloud Storage).
//!
//! Uses the same Application Default Credentials chain as the Firestore
//! client: GOOGLE_APPLICATION_CREDENTIALS, the gcloud well-known file, then
//! the metadata server. Tokens are cached by the generator until shortly
//! before they expire.

use anyhow::Context;
use gcloud_sdk::{ExternalJwtFunctionSource, GoogleAuthTokenGenerator, Token, TokenSourceType};

/// Cached access token source for the service's Google credentials.
pub struct GcpTokenProvider {
    generator: GoogleAuthTokenGenerator,
}

impl GcpTokenProvider {
    /// Application Default Credentials, or a placeholder token when talking
    /// to the local emulators.
    pub async fn from_env() -> anyhow::Result<Self> {
        let emulated = std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
            || std::env::var("FIREBASE_AUTH_EMULATOR_HOST").is_ok();

        if emulated {
            tracing::info!("Using placeholder Google credentials for emulators");
            return Self::with_source(TokenSourceType::ExternalSource(Box::new(
                ExternalJwtFunctionSource::new(|| async { Ok(placeholder_token("owner")) }),
            )))
            .await;
        }

        Self::with_source(TokenSourceType::Default).await
    }

    pub async fn with_source(source: TokenSourceType) -> anyhow::Result<Self> {
        let generator =
            GoogleAuthTokenGenerator::new(source, gcloud_sdk::GCP_DEFAULT_SCOPES.clone())
                .await
                .context("failed initializing Google credentials")?;
        Ok(Self { generator })
    }

    /// Return a valid access token, refreshing it if needed.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        let token = self
            .generator
            .create_token()
            .await
            .context("failed obtaining Google access token")?;
        Ok(token.token.as_sensitive_str().to_string())
    }
}

fn placeholder_token(value: &str) -> Token {
    Token::new(
        "Bearer".to_string(),
        value.to_string().into(),
        chrono::Utc::now() + chrono::Duration::hours(1),
    )
}
