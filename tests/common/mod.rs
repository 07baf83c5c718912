// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use carter_care::config::Config;
use carter_care::db::FirestoreDb;
use carter_care::routes::create_router;
use carter_care::services::{IdentityProvider, PhotoStore};
use carter_care::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Password that satisfies the policy.
#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "Passw0rdOK";

/// Configured admin in `Config::test_default()`.
#[allow(dead_code)]
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Configured super-admin in `Config::test_default()`.
#[allow(dead_code)]
pub const SUPER_ADMIN_EMAIL: &str = "dev@example.com";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app on in-memory backends.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    let photos = PhotoStore::in_memory(&config);
    let state = Arc::new(AppState::new(
        config,
        FirestoreDb::new_in_memory(),
        IdentityProvider::in_memory(),
        photos,
    ));
    (create_router(state.clone()), state)
}

/// Build a JSON request, optionally with a bearer token.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a bodyless request with a bearer token.
#[allow(dead_code)]
pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register an account through the API.
#[allow(dead_code)]
pub async fn sign_up(app: &Router, email: &str, password: &str, name: &str) -> Response {
    send(
        app,
        json_request(
            "POST",
            "/auth/signup",
            None,
            json!({ "email": email, "password": password, "name": name }),
        ),
    )
    .await
}

#[allow(dead_code)]
pub async fn sign_in(app: &Router, email: &str, password: &str) -> Response {
    send(
        app,
        json_request(
            "POST",
            "/auth/signin",
            None,
            json!({ "email": email, "password": password }),
        ),
    )
    .await
}

/// Sign up (if needed) and sign in, returning the session token.
#[allow(dead_code)]
pub async fn signed_in_user(app: &Router, email: &str) -> String {
    let response = sign_up(app, email, TEST_PASSWORD, "Test User").await;
    assert!(
        response.status() == StatusCode::CREATED || response.status() == StatusCode::CONFLICT,
        "sign-up failed: {}",
        response.status()
    );

    let response = sign_in(app, email, TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK, "sign-in failed");
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// A minimal valid workout body.
#[allow(dead_code)]
pub fn workout_body(name: &str, calories: u32, minutes: u32) -> Value {
    json!({
        "workout_type": "strength",
        "name": name,
        "duration_minutes": minutes,
        "calories": calories,
        "date": "2026-03-14"
    })
}

/// A minimal valid meal body.
#[allow(dead_code)]
pub fn meal_body(name: &str, calories: u32) -> Value {
    json!({
        "name": name,
        "meal_type": "lunch",
        "calories": calories,
        "protein_g": 30.0,
        "date": "2026-03-14"
    })
}
