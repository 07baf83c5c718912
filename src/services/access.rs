// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Permission tiers, view modes and the per-request access context.
//!
//! The effective tier is derived on every request from three inputs: the
//! caller's email, the admin set (configured + stored roster) and the
//! super-admin set (configured only). Super-admins may additionally ask to
//! preview a lower tier. Nothing here is persisted.

use crate::error::AppError;
use std::collections::BTreeSet;

/// Request header carrying the preview view mode.
pub const VIEW_MODE_HEADER: &str = "x-view-mode";
/// Request header carrying the view-as target email.
pub const VIEW_AS_HEADER: &str = "x-view-as";

/// Preview override, only meaningful for super-admins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Normal,
    AdminPreview,
    UserPreview,
}

impl ViewMode {
    /// Parse a header value. Unknown values are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(ViewMode::Normal),
            "admin-preview" => Some(ViewMode::AdminPreview),
            "user-preview" => Some(ViewMode::UserPreview),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Normal => "normal",
            ViewMode::AdminPreview => "admin-preview",
            ViewMode::UserPreview => "user-preview",
        }
    }
}

/// Effective permissions after view-mode resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectiveAccess {
    pub is_admin: bool,
    pub is_super_admin: bool,
}

/// Ordered permission tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl EffectiveAccess {
    pub fn role(self) -> Role {
        if self.is_super_admin {
            Role::SuperAdmin
        } else if self.is_admin {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Resolve effective permissions.
///
/// Non-super-admins get their raw membership and `view_mode` is ignored.
/// A super-admin gets the full tier in `Normal`, admin only in
/// `AdminPreview`, and nothing elevated in `UserPreview`.
pub fn resolve(
    email: &str,
    admin_emails: &BTreeSet<String>,
    super_admin_emails: &BTreeSet<String>,
    view_mode: ViewMode,
) -> EffectiveAccess {
    if !super_admin_emails.contains(email) {
        return EffectiveAccess {
            is_admin: admin_emails.contains(email),
            is_super_admin: false,
        };
    }

    match view_mode {
        ViewMode::Normal => EffectiveAccess {
            is_admin: true,
            is_super_admin: true,
        },
        ViewMode::AdminPreview => EffectiveAccess {
            is_admin: true,
            is_super_admin: false,
        },
        ViewMode::UserPreview => EffectiveAccess::default(),
    }
}

/// Union of configured admins and the stored roster.
pub fn effective_admin_set(
    configured: &BTreeSet<String>,
    roster: &BTreeSet<String>,
) -> BTreeSet<String> {
    configured.union(roster).cloned().collect()
}

/// The user whose records are being viewed read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewAsTarget {
    pub email: String,
    pub subject_id: String,
}

/// Authenticated caller plus resolved permissions, built once per request.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub user_id: String,
    pub email: String,
    pub session_id: String,
    pub access: EffectiveAccess,
    pub view_mode: ViewMode,
    pub view_as: Option<ViewAsTarget>,
}

impl AccessContext {
    pub fn role(&self) -> Role {
        self.access.role()
    }

    /// Fail with `Forbidden` unless the effective tier is at least `min`.
    pub fn require(&self, min: Role) -> Result<(), AppError> {
        if self.role() >= min {
            Ok(())
        } else {
            tracing::debug!(
                email = %self.email,
                role = self.role().as_str(),
                required = min.as_str(),
                "Access denied"
            );
            Err(AppError::Forbidden(format!(
                "Requires {} access",
                min.as_str()
            )))
        }
    }

    /// Owner id used for record reads (the view-as target if one is active).
    pub fn read_owner(&self) -> &str {
        match &self.view_as {
            Some(target) => &target.subject_id,
            None => &self.user_id,
        }
    }

    /// Owner id used for record writes. Writes are refused while viewing as
    /// another user.
    pub fn write_owner(&self) -> Result<&str, AppError> {
        if let Some(target) = &self.view_as {
            tracing::warn!(
                email = %self.email,
                target = %target.email,
                "Write rejected in view-as context"
            );
            return Err(AppError::Forbidden(
                "Read-only while viewing as another user".to_string(),
            ));
        }
        Ok(&self.user_id)
    }

    /// True if `email` (already normalized) is the caller.
    pub fn is_self(&self, email: &str) -> bool {
        self.email == email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_email_list;

    fn sets() -> (BTreeSet<String>, BTreeSet<String>) {
        (
            parse_email_list("admin@example.com"),
            parse_email_list("dev@example.com"),
        )
    }

    #[test]
    fn test_view_mode_ignored_for_non_super_admins() {
        let (admins, supers) = sets();
        for mode in [
            ViewMode::Normal,
            ViewMode::AdminPreview,
            ViewMode::UserPreview,
        ] {
            assert_eq!(
                resolve("admin@example.com", &admins, &supers, mode).role(),
                Role::Admin
            );
            assert_eq!(
                resolve("user@example.com", &admins, &supers, mode).role(),
                Role::User
            );
        }
    }

    #[test]
    fn test_super_admin_downgrades_by_view_mode() {
        let (admins, supers) = sets();
        let dev = "dev@example.com";
        assert_eq!(
            resolve(dev, &admins, &supers, ViewMode::Normal),
            EffectiveAccess {
                is_admin: true,
                is_super_admin: true
            }
        );
        assert_eq!(
            resolve(dev, &admins, &supers, ViewMode::AdminPreview),
            EffectiveAccess {
                is_admin: true,
                is_super_admin: false
            }
        );
        assert_eq!(
            resolve(dev, &admins, &supers, ViewMode::UserPreview),
            EffectiveAccess::default()
        );
    }

    #[test]
    fn test_view_mode_parse() {
        assert_eq!(ViewMode::parse(" Admin-Preview "), Some(ViewMode::AdminPreview));
        assert_eq!(ViewMode::parse("user-preview"), Some(ViewMode::UserPreview));
        assert_eq!(ViewMode::parse("god-mode"), None);
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::User < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
    }

    #[test]
    fn test_view_as_reads_target_and_blocks_writes() {
        let ctx = AccessContext {
            user_id: "admin-uid".to_string(),
            email: "admin@example.com".to_string(),
            session_id: "sid".to_string(),
            access: EffectiveAccess {
                is_admin: true,
                is_super_admin: false,
            },
            view_mode: ViewMode::Normal,
            view_as: Some(ViewAsTarget {
                email: "user@example.com".to_string(),
                subject_id: "user-uid".to_string(),
            }),
        };

        assert_eq!(ctx.read_owner(), "user-uid");
        assert!(matches!(ctx.write_owner(), Err(AppError::Forbidden(_))));
        assert!(ctx.require(Role::Admin).is_ok());
        assert!(ctx.require(Role::SuperAdmin).is_err());
    }

    #[test]
    fn test_effective_admin_set_is_union() {
        let configured = parse_email_list("a@example.com");
        let roster = parse_email_list("b@example.com,a@example.com");
        let merged = effective_admin_set(&configured, &roster);
        assert_eq!(merged.len(), 2);
    }
}
