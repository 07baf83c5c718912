// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod admin;
pub mod gcp_auth;
pub mod identity;
pub mod password;
pub mod photos;
pub mod records;
pub mod session;

pub use access::{AccessContext, EffectiveAccess, Role, ViewAsTarget, ViewMode};
pub use admin::AdminService;
pub use gcp_auth::GcpTokenProvider;
pub use identity::IdentityProvider;
pub use password::{check_password_policy, PasswordPolicyError};
pub use photos::PhotoStore;
pub use records::RecordService;
pub use session::{Claims, SessionManager};
