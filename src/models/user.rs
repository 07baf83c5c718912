// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile and session models for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Durable user profile stored in Firestore.
///
/// Keyed by normalized email. Mirrors the identity provider account and
/// carries the admin-controlled `disabled` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    /// Normalized email (also used as document ID)
    pub email: String,
    /// Identity provider subject (local id); owner id for all entries
    pub subject_id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Set by a super-admin to block access
    #[serde(default)]
    pub disabled: bool,
    /// When the profile was first written
    pub created_at: String,
    /// Most recent successful sign-in
    pub last_login_at: String,
    /// Last profile mutation
    #[serde(default)]
    pub updated_at: String,
}

/// Server-side session row backing a session credential.
///
/// A credential is valid only while its row exists, so deleting the row
/// revokes the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub created_at: String,
    pub expires_at: String,
}
