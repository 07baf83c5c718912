// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin console operations.
//!
//! Every operation checks the caller's effective tier before touching the
//! store or the identity provider. Read-only views need `Admin`; anything
//! that changes another account or platform state needs `SuperAdmin`.

use crate::config::{normalize_email, Config};
use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    AdminRoster, LockdownSetting, MealEntry, Measurements, PlatformStats, ProgressEntry,
    UserProfile, UserStats, WorkoutEntry,
};
use crate::services::access::{effective_admin_set, AccessContext, Role};
use crate::services::identity::IdentityProvider;
use crate::services::password::check_password_policy;
use crate::time_utils::now_sortable;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Page size for full-collection scans.
pub const PLATFORM_STATS_PAGE_SIZE: u32 = 200;
/// Recent entries per kind in a user summary.
pub const SUMMARY_RECENT_LIMIT: u32 = 10;

/// A user row in the admin console.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminUserView {
    pub email: String,
    pub subject_id: String,
    pub name: String,
    pub disabled: bool,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub created_at: String,
    pub last_login_at: String,
}

/// Progress entry as shown to admins (no photo key).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressSummary {
    pub entry_id: String,
    pub weight: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub measurements: Measurements,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub has_photo: bool,
    pub created_at: String,
}

impl From<ProgressEntry> for ProgressSummary {
    fn from(entry: ProgressEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            weight: entry.weight,
            body_fat_percent: entry.body_fat_percent,
            measurements: entry.measurements,
            date: entry.date,
            has_photo: !entry.photo_key.is_empty(),
            created_at: entry.created_at,
        }
    }
}

/// One user's totals and most recent entries.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserSummary {
    pub user: AdminUserView,
    pub stats: UserStats,
    pub recent_workouts: Vec<WorkoutEntry>,
    pub recent_meals: Vec<MealEntry>,
    pub recent_progress: Vec<ProgressSummary>,
}

/// Admin membership, split by origin.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminList {
    /// From ADMIN_EMAILS; not editable at runtime
    pub configured: Vec<String>,
    /// Added through the console
    pub stored: Vec<String>,
    pub super_admins: Vec<String>,
    pub updated_by: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Clone)]
pub struct AdminService {
    db: FirestoreDb,
    identity: IdentityProvider,
    admin_emails: BTreeSet<String>,
    super_admin_emails: BTreeSet<String>,
}

impl AdminService {
    pub fn new(db: FirestoreDb, identity: IdentityProvider, config: &Config) -> Self {
        Self {
            db,
            identity,
            admin_emails: config.admin_emails.clone(),
            super_admin_emails: config.super_admin_emails.clone(),
        }
    }

    async fn all_admins(&self) -> Result<BTreeSet<String>> {
        let roster = self.db.get_admin_roster().await?;
        Ok(effective_admin_set(&self.admin_emails, &roster.admin_emails))
    }

    fn view(&self, profile: UserProfile, admins: &BTreeSet<String>) -> AdminUserView {
        let is_super_admin = self.super_admin_emails.contains(&profile.email);
        AdminUserView {
            is_admin: is_super_admin || admins.contains(&profile.email),
            is_super_admin,
            email: profile.email,
            subject_id: profile.subject_id,
            name: profile.name,
            disabled: profile.disabled,
            created_at: profile.created_at,
            last_login_at: profile.last_login_at,
        }
    }

    async fn all_profiles(&self) -> Result<Vec<UserProfile>> {
        let mut profiles = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .db
                .list_profiles_page(PLATFORM_STATS_PAGE_SIZE, offset)
                .await?;
            let fetched = page.len() as u32;
            profiles.extend(page);
            if fetched < PLATFORM_STATS_PAGE_SIZE {
                return Ok(profiles);
            }
            offset += fetched;
        }
    }

    async fn require_profile(&self, email: &str) -> Result<UserProfile> {
        self.db
            .get_profile(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", email)))
    }

    // ─── Admin tier ─────────────────────────────────────────────

    pub async fn list_all_users(&self, ctx: &AccessContext) -> Result<Vec<AdminUserView>> {
        ctx.require(Role::Admin)?;
        let admins = self.all_admins().await?;
        let profiles = self.all_profiles().await?;
        Ok(profiles
            .into_iter()
            .map(|p| self.view(p, &admins))
            .collect())
    }

    pub async fn user_summary(&self, ctx: &AccessContext, email: &str) -> Result<UserSummary> {
        ctx.require(Role::Admin)?;
        let email = normalize_email(email);
        let profile = self.require_profile(&email).await?;
        let owner_id = profile.subject_id.clone();
        let limit = Some(SUMMARY_RECENT_LIMIT);

        let (stats, workouts, meals, progress) = tokio::try_join!(
            self.db.get_user_stats(&owner_id),
            self.db.list_entries::<WorkoutEntry>(&owner_id, limit),
            self.db.list_entries::<MealEntry>(&owner_id, limit),
            self.db.list_entries::<ProgressEntry>(&owner_id, limit),
        )?;

        let admins = self.all_admins().await?;
        Ok(UserSummary {
            user: self.view(profile, &admins),
            stats: stats.unwrap_or_else(|| UserStats::for_owner(&owner_id)),
            recent_workouts: workouts,
            recent_meals: meals,
            recent_progress: progress.into_iter().map(ProgressSummary::from).collect(),
        })
    }

    /// Platform totals from the per-user aggregates, one page at a time.
    pub async fn platform_stats(&self, ctx: &AccessContext) -> Result<PlatformStats> {
        ctx.require(Role::Admin)?;

        let mut stats = PlatformStats::default();
        for profile in self.all_profiles().await? {
            stats.total_users += 1;
            if profile.disabled {
                stats.disabled_users += 1;
            }
        }
        stats.active_users = stats.total_users - stats.disabled_users;

        let (mut burned, mut consumed) = (0u64, 0u64);
        let mut offset = 0;
        loop {
            let page = self
                .db
                .list_user_stats_page(PLATFORM_STATS_PAGE_SIZE, offset)
                .await?;
            let fetched = page.len() as u32;
            for user_stats in &page {
                stats.accumulate(user_stats, &mut burned, &mut consumed);
            }
            if fetched < PLATFORM_STATS_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        stats.finish(burned, consumed);
        Ok(stats)
    }

    pub async fn lockdown_status(&self, ctx: &AccessContext) -> Result<LockdownSetting> {
        ctx.require(Role::Admin)?;
        self.db.get_lockdown().await
    }

    pub async fn list_admins(&self, ctx: &AccessContext) -> Result<AdminList> {
        ctx.require(Role::Admin)?;
        let roster = self.db.get_admin_roster().await?;
        Ok(AdminList {
            configured: self.admin_emails.iter().cloned().collect(),
            stored: roster.admin_emails.into_iter().collect(),
            super_admins: self.super_admin_emails.iter().cloned().collect(),
            updated_by: roster.updated_by,
            updated_at: roster.updated_at,
        })
    }

    // ─── Super-admin tier ───────────────────────────────────────

    pub async fn set_user_disabled(
        &self,
        ctx: &AccessContext,
        email: &str,
        disabled: bool,
    ) -> Result<AdminUserView> {
        ctx.require(Role::SuperAdmin)?;
        let email = normalize_email(email);
        if ctx.is_self(&email) {
            return Err(AppError::Forbidden(
                "You cannot disable your own account".to_string(),
            ));
        }

        let mut profile = self.require_profile(&email).await?;
        profile.disabled = disabled;
        profile.updated_at = now_sortable();
        self.db.upsert_profile(&profile).await?;

        tracing::info!(
            actor = %ctx.email,
            target = %email,
            disabled,
            "User disabled flag changed"
        );

        let admins = self.all_admins().await?;
        Ok(self.view(profile, &admins))
    }

    pub async fn set_lockdown(&self, ctx: &AccessContext, enabled: bool) -> Result<LockdownSetting> {
        ctx.require(Role::SuperAdmin)?;
        let setting = LockdownSetting {
            enabled,
            updated_by: Some(ctx.email.clone()),
            updated_at: Some(now_sortable()),
        };
        self.db.set_lockdown(&setting).await?;
        tracing::warn!(actor = %ctx.email, enabled, "Platform lockdown changed");
        Ok(setting)
    }

    /// Set another user's password. The policy is checked before the
    /// provider is called.
    pub async fn rotate_user_credential(
        &self,
        ctx: &AccessContext,
        subject_id: &str,
        new_password: &str,
    ) -> Result<()> {
        ctx.require(Role::SuperAdmin)?;
        check_password_policy(new_password).map_err(|e| e.into_app_error("new_password"))?;

        if subject_id.trim().is_empty() {
            return Err(AppError::validation("subject_id", "Subject id is required"));
        }

        self.identity.set_password(subject_id, new_password).await?;
        tracing::info!(actor = %ctx.email, target = subject_id, "User password rotated");
        Ok(())
    }

    pub async fn add_admin(&self, ctx: &AccessContext, email: &str) -> Result<AdminList> {
        ctx.require(Role::SuperAdmin)?;
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("email", "Invalid email address"));
        }
        if ctx.is_self(&email) {
            return Err(AppError::Forbidden(
                "You cannot change your own admin status".to_string(),
            ));
        }
        if self.super_admin_emails.contains(&email) {
            return Err(AppError::Conflict(format!("{} is a super-admin", email)));
        }

        let mut roster = self.db.get_admin_roster().await?;
        if self.admin_emails.contains(&email) || roster.admin_emails.contains(&email) {
            return Err(AppError::Conflict(format!("{} is already an admin", email)));
        }

        roster.admin_emails.insert(email.clone());
        self.save_roster(ctx, roster).await?;
        tracing::info!(actor = %ctx.email, target = %email, "Admin added");
        self.list_admins(ctx).await
    }

    pub async fn remove_admin(&self, ctx: &AccessContext, email: &str) -> Result<AdminList> {
        ctx.require(Role::SuperAdmin)?;
        let email = normalize_email(email);
        if ctx.is_self(&email) {
            return Err(AppError::Forbidden(
                "You cannot change your own admin status".to_string(),
            ));
        }
        if self.admin_emails.contains(&email) {
            return Err(AppError::Forbidden(format!(
                "{} is configured as an admin and cannot be removed here",
                email
            )));
        }

        let mut roster = self.db.get_admin_roster().await?;
        if !roster.admin_emails.remove(&email) {
            return Err(AppError::NotFound(format!("Admin {}", email)));
        }

        self.save_roster(ctx, roster).await?;
        tracing::info!(actor = %ctx.email, target = %email, "Admin removed");
        self.list_admins(ctx).await
    }

    async fn save_roster(&self, ctx: &AccessContext, mut roster: AdminRoster) -> Result<()> {
        roster.updated_by = Some(ctx.email.clone());
        roster.updated_at = Some(now_sortable());
        self.db.set_admin_roster(&roster).await
    }
}
