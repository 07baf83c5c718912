// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::models::{
    MealEntry, NewMeal, NewProgress, NewWorkout, ProgressEntry, UserStats, WorkoutEntry,
};
use crate::services::photos::{ProgressFn, SignedUrl};
use crate::services::records::PhotoUpload;
use crate::services::AccessContext;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Room for the multipart framing and the `entry` JSON part.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// API routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes(max_photo_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/workouts", get(list_workouts).post(add_workout))
        .route("/api/workouts/{entry_id}", delete(delete_workout))
        .route("/api/meals", get(list_meals).post(add_meal))
        .route("/api/meals/{entry_id}", delete(delete_meal))
        .route(
            "/api/progress",
            get(list_progress).post(add_progress).layer(DefaultBodyLimit::max(
                max_photo_bytes + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route("/api/progress/{entry_id}", delete(delete_progress))
        .route("/api/progress/{entry_id}/photo-url", get(progress_photo_url))
        .route("/api/stats", get(get_stats))
}

// ─── User Profile ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ViewAsResponse {
    pub email: String,
    pub subject_id: String,
    pub name: String,
}

/// Current user and resolved permissions.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub view_mode: String,
    pub view_as: Option<ViewAsResponse>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<MeResponse>> {
    let name = state
        .db
        .get_profile(&ctx.email)
        .await?
        .map(|p| p.name)
        .unwrap_or_default();

    let view_as = match &ctx.view_as {
        Some(target) => Some(ViewAsResponse {
            email: target.email.clone(),
            subject_id: target.subject_id.clone(),
            name: state
                .db
                .get_profile(&target.email)
                .await?
                .map(|p| p.name)
                .unwrap_or_default(),
        }),
        None => None,
    };

    Ok(Json(MeResponse {
        user_id: ctx.user_id.clone(),
        email: ctx.email.clone(),
        name,
        role: ctx.role().as_str().to_string(),
        is_admin: ctx.access.is_admin,
        is_super_admin: ctx.access.is_super_admin,
        view_mode: ctx.view_mode.as_str().to_string(),
        view_as,
    }))
}

// ─── Entries ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListQuery {
    /// Maximum entries to return (most recent first)
    limit: Option<u32>,
}

async fn list_workouts(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<WorkoutEntry>>> {
    Ok(Json(state.records.list(&ctx, query.limit).await?))
}

async fn add_workout(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Json(new): Json<NewWorkout>,
) -> Result<(StatusCode, Json<WorkoutEntry>)> {
    let entry = state.records.add_workout(&ctx, new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_workout(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode> {
    state.records.delete::<WorkoutEntry>(&ctx, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_meals(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MealEntry>>> {
    Ok(Json(state.records.list(&ctx, query.limit).await?))
}

async fn add_meal(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Json(new): Json<NewMeal>,
) -> Result<(StatusCode, Json<MealEntry>)> {
    let entry = state.records.add_meal(&ctx, new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_meal(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode> {
    state.records.delete::<MealEntry>(&ctx, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Progress ────────────────────────────────────────────────

async fn list_progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProgressEntry>>> {
    Ok(Json(state.records.list(&ctx, query.limit).await?))
}

/// Multipart body: a `photo` file part and an `entry` JSON part.
async fn add_progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProgressEntry>)> {
    let mut photo: Option<PhotoUpload> = None;
    let mut entry: Option<NewProgress> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("photo") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid photo part: {}", e)))?;
                photo = Some(PhotoUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("entry") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid entry part: {}", e)))?;
                entry = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| AppError::BadRequest(format!("Invalid entry JSON: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let photo = photo.ok_or_else(|| AppError::validation("photo", "A photo is required"))?;
    let entry = entry.ok_or_else(|| AppError::BadRequest("Missing entry part".to_string()))?;

    let owner = ctx.user_id.clone();
    let on_progress: ProgressFn = Arc::new(move |percent| {
        tracing::debug!(user_id = %owner, percent, "Photo upload progress");
    });

    let created = state
        .records
        .add_progress(&ctx, entry, photo, on_progress)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode> {
    state.records.delete_progress(&ctx, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn progress_photo_url(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(entry_id): Path<String>,
) -> Result<Json<SignedUrl>> {
    Ok(Json(state.records.progress_photo_url(&ctx, &entry_id).await?))
}

// ─── Stats ───────────────────────────────────────────────────

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<UserStats>> {
    Ok(Json(state.records.stats(&ctx).await?))
}
