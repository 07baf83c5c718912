// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-up, sign-in and sign-out routes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::SESSION_COOKIE;
use crate::services::session::SignUpRequest;
use crate::services::Claims;
use crate::AppState;

/// Public auth routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
}

/// Auth routes that need an existing session.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/signout", post(sign_out))
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Signed-in user.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SignInResponse {
    pub token: String,
    pub expires_at: String,
    pub user: SessionUser,
}

/// Session cookie. `Secure` is left off when the frontend is served over
/// plain HTTP (local development).
fn session_cookie(value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

fn use_secure_cookies(state: &AppState) -> bool {
    state.config.frontend_url.starts_with("https://")
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<StatusCode> {
    state.sessions.sign_up(req).await?;
    Ok(StatusCode::CREATED)
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<Response> {
    let credential = state.sessions.sign_in(&req.email, &req.password).await?;

    let cookie = session_cookie(
        credential.token.clone(),
        state.config.session_ttl_hours * 3600,
        use_secure_cookies(&state),
    );

    let body = SignInResponse {
        token: credential.token,
        expires_at: credential.expires_at,
        user: SessionUser {
            user_id: credential.user_id,
            email: credential.email,
            name: credential.name,
        },
    };

    Ok((jar.add(cookie), Json(body)).into_response())
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
) -> Result<Response> {
    state.sessions.sign_out(&claims).await?;
    let cookie = session_cookie(String::new(), 0, use_secure_cookies(&state));
    Ok((StatusCode::NO_CONTENT, jar.add(cookie)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), 3600, false).to_string();
        assert!(cookie.starts_with("carter_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));

        let cleared = session_cookie(String::new(), 0, true).to_string();
        assert!(cleared.starts_with("carter_session=;"));
        assert!(cleared.contains("; Secure"));
        assert!(cleared.contains("Max-Age=0"));
    }
}
