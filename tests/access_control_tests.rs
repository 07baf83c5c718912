// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lockdown, disabled accounts, view-as and preview mode.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use carter_care::config::Config;
use serde_json::json;

mod common;
use common::{
    authed_request, body_json, json_request, send, sign_in, signed_in_user, workout_body,
    ADMIN_EMAIL, SUPER_ADMIN_EMAIL, TEST_PASSWORD,
};

fn with_header(mut request: Request<Body>, name: &'static str, value: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(name, value.parse().unwrap());
    request
}

// ═══════════════════════════════════════════════════════════════════════════
// LOCKDOWN
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_lockdown_blocks_users_but_not_super_admin() {
    let (app, _) = common::create_test_app();
    let user_token = signed_in_user(&app, "user@example.com").await;
    let dev_token = signed_in_user(&app, SUPER_ADMIN_EMAIL).await;

    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/lockdown",
            Some(&dev_token),
            json!({ "enabled": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["enabled"], true);
    assert_eq!(body["updated_by"], SUPER_ADMIN_EMAIL);

    // Existing session is refused and revoked
    let response = send(&app, authed_request("GET", "/api/me", &user_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "platform_lockdown");

    let response = send(&app, authed_request("GET", "/api/me", &user_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // New sign-in is refused
    let response = sign_in(&app, "user@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "platform_lockdown");

    // Configured admins are locked out too
    signed_in_user_allowing_denial(&app, ADMIN_EMAIL).await;

    // Super-admin keeps working
    let response = send(&app, authed_request("GET", "/api/me", &dev_token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Lift the lockdown
    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/lockdown",
            Some(&dev_token),
            json!({ "enabled": false }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = sign_in(&app, "user@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn signed_in_user_allowing_denial(app: &axum::Router, email: &str) {
    common::sign_up(app, email, TEST_PASSWORD, "Locked Out").await;
    let response = sign_in(app, email, TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_toggle_lockdown() {
    let (app, _) = common::create_test_app();
    let admin_token = signed_in_user(&app, ADMIN_EMAIL).await;

    let response = send(&app, authed_request("GET", "/api/admin/lockdown", &admin_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["enabled"], false);

    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/lockdown",
            Some(&admin_token),
            json!({ "enabled": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ═══════════════════════════════════════════════════════════════════════════
// DISABLED ACCOUNTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_disabling_user_ends_active_session() {
    let (app, state) = common::create_test_app();
    let user_token = signed_in_user(&app, "henry@example.com").await;
    let dev_token = signed_in_user(&app, SUPER_ADMIN_EMAIL).await;

    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/users/henry@example.com/disabled",
            Some(&dev_token),
            json!({ "disabled": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["disabled"], true);

    let response = send(&app, authed_request("GET", "/api/workouts", &user_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "account_disabled");

    // Provider tokens were revoked along with the session row
    let profile = state
        .db
        .get_profile("henry@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(state.identity.revoked_since(&profile.subject_id).is_some());

    let response = send(&app, authed_request("GET", "/api/workouts", &user_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = sign_in(&app, "henry@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "account_disabled");

    // Re-enable and sign in again; the profile keeps its creation time
    let created_at = profile.created_at.clone();
    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/users/henry@example.com/disabled",
            Some(&dev_token),
            json!({ "disabled": false }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = sign_in(&app, "henry@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = state
        .db
        .get_profile("henry@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.created_at, created_at);
    assert!(!profile.disabled);
}

#[tokio::test]
async fn test_super_admin_cannot_disable_self() {
    let (app, _) = common::create_test_app();
    let dev_token = signed_in_user(&app, SUPER_ADMIN_EMAIL).await;

    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/users/dev@example.com/disabled",
            Some(&dev_token),
            json!({ "disabled": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_disable_unknown_user_not_found() {
    let (app, _) = common::create_test_app();
    let dev_token = signed_in_user(&app, SUPER_ADMIN_EMAIL).await;

    let response = send(
        &app,
        json_request(
            "PUT",
            "/api/admin/users/ghost@example.com/disabled",
            Some(&dev_token),
            json!({ "disabled": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
// VIEW-AS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_admin_view_as_is_read_only() {
    let (app, _) = common::create_test_app();
    let user_token = signed_in_user(&app, "ivy@example.com").await;
    let admin_token = signed_in_user(&app, ADMIN_EMAIL).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/workouts",
            Some(&user_token),
            workout_body("Leg day", 400, 60),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry_id = body_json(response).await["entry_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Reads resolve to the target user
    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/workouts", &admin_token),
            "x-view-as",
            "IVY@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let workouts = body_json(response).await;
    assert_eq!(workouts.as_array().unwrap().len(), 1);
    assert_eq!(workouts[0]["name"], "Leg day");

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/stats", &admin_token),
            "x-view-as",
            "ivy@example.com",
        ),
    )
    .await;
    assert_eq!(body_json(response).await["workout_count"], 1);

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/me", &admin_token),
            "x-view-as",
            "ivy@example.com",
        ),
    )
    .await;
    let me = body_json(response).await;
    assert_eq!(me["email"], ADMIN_EMAIL);
    assert_eq!(me["view_as"]["email"], "ivy@example.com");

    // Writes are refused
    let response = send(
        &app,
        with_header(
            json_request(
                "POST",
                "/api/workouts",
                Some(&admin_token),
                workout_body("Sneaky", 1, 1),
            ),
            "x-view-as",
            "ivy@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        with_header(
            authed_request(
                "DELETE",
                &format!("/api/workouts/{}", entry_id),
                &admin_token,
            ),
            "x-view-as",
            "ivy@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The entry survived
    let response = send(&app, authed_request("GET", "/api/workouts", &user_token)).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_cannot_view_as() {
    let (app, _) = common::create_test_app();
    signed_in_user(&app, "jack@example.com").await;
    let user_token = signed_in_user(&app, "kate@example.com").await;

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/workouts", &user_token),
            "x-view-as",
            "jack@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_view_as_self_is_ignored() {
    let (app, _) = common::create_test_app();
    let user_token = signed_in_user(&app, "liam@example.com").await;

    let response = send(
        &app,
        with_header(
            json_request(
                "POST",
                "/api/workouts",
                Some(&user_token),
                workout_body("Run", 300, 30),
            ),
            "x-view-as",
            "liam@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_view_as_unknown_user_not_found() {
    let (app, _) = common::create_test_app();
    let admin_token = signed_in_user(&app, ADMIN_EMAIL).await;

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/workouts", &admin_token),
            "x-view-as",
            "ghost@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
// PREVIEW MODE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_super_admin_preview_modes() {
    let (app, _) = common::create_test_app();
    let dev_token = signed_in_user(&app, SUPER_ADMIN_EMAIL).await;

    let response = send(&app, authed_request("GET", "/api/me", &dev_token)).await;
    let me = body_json(response).await;
    assert_eq!(me["role"], "super_admin");
    assert_eq!(me["is_admin"], true);
    assert_eq!(me["is_super_admin"], true);

    // Admin preview: admin pages yes, super-admin actions no
    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/admin/users", &dev_token),
            "x-view-mode",
            "admin-preview",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        with_header(
            json_request(
                "PUT",
                "/api/admin/lockdown",
                Some(&dev_token),
                json!({ "enabled": true }),
            ),
            "x-view-mode",
            "admin-preview",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // User preview: no admin pages
    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/admin/users", &dev_token),
            "x-view-mode",
            "user-preview",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/me", &dev_token),
            "x-view-mode",
            "user-preview",
        ),
    )
    .await;
    let me = body_json(response).await;
    assert_eq!(me["role"], "user");
    assert_eq!(me["view_mode"], "user-preview");

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/me", &dev_token),
            "x-view-mode",
            "godmode",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_preview_mode_does_not_elevate_users() {
    let (app, _) = common::create_test_app();
    let user_token = signed_in_user(&app, "mia@example.com").await;

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/admin/users", &user_token),
            "x-view-mode",
            "admin-preview",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_preview_header_ignored_when_disabled() {
    let config = Config {
        view_mode_preview_enabled: false,
        ..Config::test_default()
    };
    let (app, _) = common::create_test_app_with(config);
    let dev_token = signed_in_user(&app, SUPER_ADMIN_EMAIL).await;

    let response = send(
        &app,
        with_header(
            authed_request("GET", "/api/admin/users", &dev_token),
            "x-view-mode",
            "user-preview",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
