// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin console routes.
//!
//! Tier checks live in [`AdminService`](crate::services::AdminService); the
//! handlers only translate between HTTP and service calls.

use crate::error::Result;
use crate::models::{LockdownSetting, PlatformStats};
use crate::services::admin::{AdminList, AdminUserView, UserSummary};
use crate::services::AccessContext;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Admin routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{email}/summary", get(user_summary))
        .route("/api/admin/users/{email}/disabled", put(set_disabled))
        .route("/api/admin/users/{subject_id}/password", post(rotate_password))
        .route("/api/admin/stats", get(platform_stats))
        .route("/api/admin/lockdown", get(get_lockdown).put(set_lockdown))
        .route("/api/admin/admins", get(list_admins).post(add_admin))
        .route("/api/admin/admins/{email}", delete(remove_admin))
}

#[derive(Deserialize)]
struct DisabledRequest {
    disabled: bool,
}

#[derive(Deserialize)]
struct PasswordRequest {
    new_password: String,
}

#[derive(Deserialize)]
struct LockdownRequest {
    enabled: bool,
}

#[derive(Deserialize)]
struct AdminRequest {
    email: String,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<Vec<AdminUserView>>> {
    Ok(Json(state.admin.list_all_users(&ctx).await?))
}

async fn user_summary(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(email): Path<String>,
) -> Result<Json<UserSummary>> {
    Ok(Json(state.admin.user_summary(&ctx, &email).await?))
}

async fn set_disabled(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(email): Path<String>,
    Json(req): Json<DisabledRequest>,
) -> Result<Json<AdminUserView>> {
    Ok(Json(
        state
            .admin
            .set_user_disabled(&ctx, &email, req.disabled)
            .await?,
    ))
}

async fn rotate_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(subject_id): Path<String>,
    Json(req): Json<PasswordRequest>,
) -> Result<StatusCode> {
    state
        .admin
        .rotate_user_credential(&ctx, &subject_id, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn platform_stats(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<PlatformStats>> {
    Ok(Json(state.admin.platform_stats(&ctx).await?))
}

async fn get_lockdown(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<LockdownSetting>> {
    Ok(Json(state.admin.lockdown_status(&ctx).await?))
}

async fn set_lockdown(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Json(req): Json<LockdownRequest>,
) -> Result<Json<LockdownSetting>> {
    Ok(Json(state.admin.set_lockdown(&ctx, req.enabled).await?))
}

async fn list_admins(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<AdminList>> {
    Ok(Json(state.admin.list_admins(&ctx).await?))
}

async fn add_admin(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Json(req): Json<AdminRequest>,
) -> Result<Json<AdminList>> {
    Ok(Json(state.admin.add_admin(&ctx, &req.email).await?))
}

async fn remove_admin(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(email): Path<String>,
) -> Result<Json<AdminList>> {
    Ok(Json(state.admin.remove_admin(&ctx, &email).await?))
}
