// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware.
//!
//! Verifies the session credential, re-runs the lockdown/disabled checks
//! and resolves the caller's [`AccessContext`] once for the request.

use crate::config::normalize_email;
use crate::error::AppError;
use crate::services::access::{
    effective_admin_set, resolve, AccessContext, Role, ViewAsTarget, ViewMode, VIEW_AS_HEADER,
    VIEW_MODE_HEADER,
};
use crate::services::Claims;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "carter_session";

/// Middleware that requires a valid session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(AppError::Unauthorized),
        }
    };

    let claims = state.sessions.get_credentials(&token).await?;
    state.sessions.check_session(&claims).await?;

    let ctx = build_access_context(&state, &claims, request.headers()).await?;

    request.extensions_mut().insert(ctx);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Resolve view mode, effective tier and view-as target for this request.
pub async fn build_access_context(
    state: &AppState,
    claims: &Claims,
    headers: &HeaderMap,
) -> Result<AccessContext, AppError> {
    let view_mode = match header_str(headers, VIEW_MODE_HEADER) {
        Some(raw) if state.config.view_mode_preview_enabled => ViewMode::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown view mode: {}", raw)))?,
        _ => ViewMode::Normal,
    };

    let roster = match state.db.get_admin_roster().await {
        Ok(roster) => roster.admin_emails,
        Err(e) => {
            tracing::warn!(error = %e, "Admin roster read failed, using configured admins only");
            Default::default()
        }
    };
    let admins = effective_admin_set(&state.config.admin_emails, &roster);
    let access = resolve(
        &claims.email,
        &admins,
        &state.config.super_admin_emails,
        view_mode,
    );

    let mut ctx = AccessContext {
        user_id: claims.sub.clone(),
        email: claims.email.clone(),
        session_id: claims.sid.clone(),
        access,
        view_mode,
        view_as: None,
    };

    if let Some(raw) = header_str(headers, VIEW_AS_HEADER) {
        let target_email = normalize_email(raw);
        if !target_email.is_empty() && !ctx.is_self(&target_email) {
            ctx.require(Role::Admin)?;
            let target = state
                .db
                .get_profile(&target_email)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {}", target_email)))?;

            tracing::debug!(
                email = %ctx.email,
                target = %target.email,
                "Viewing as another user"
            );
            ctx.view_as = Some(ViewAsTarget {
                email: target.email,
                subject_id: target.subject_id,
            });
        }
    }

    Ok(ctx)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
