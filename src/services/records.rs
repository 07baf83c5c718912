// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout, meal and progress entries, gated by the caller's access context.
//!
//! Reads use the view-as target when one is active; writes always use the
//! caller's own id and are refused under view-as. Progress entries pair a
//! store record with a photo object and are written in two phases:
//! 1. create: upload photo, then write record (photo removed if the write fails)
//! 2. delete: remove record + stats, then photo (record restored if the photo stays)

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    EntryRecord, MealEntry, NewMeal, NewProgress, NewWorkout, ProgressEntry, UserStats,
    WorkoutEntry,
};
use crate::services::access::AccessContext;
use crate::services::photos::{PhotoStore, ProgressFn, SignedUrl};
use crate::time_utils::now_sortable;
use validator::Validate;

/// Upper bound on a single list call.
pub const MAX_LIST_LIMIT: u32 = 500;

/// A photo as received from the client.
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Entry operations for the signed-in user.
#[derive(Clone)]
pub struct RecordService {
    db: FirestoreDb,
    photos: PhotoStore,
}

fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl RecordService {
    pub fn new(db: FirestoreDb, photos: PhotoStore) -> Self {
        Self { db, photos }
    }

    pub async fn add_workout(&self, ctx: &AccessContext, new: NewWorkout) -> Result<WorkoutEntry> {
        new.validate()?;
        let owner_id = ctx.write_owner()?;
        let entry = new.into_entry(owner_id, new_entry_id(), now_sortable());
        self.db.add_entry(&entry).await?;
        Ok(entry)
    }

    pub async fn add_meal(&self, ctx: &AccessContext, new: NewMeal) -> Result<MealEntry> {
        new.validate()?;
        let owner_id = ctx.write_owner()?;
        let entry = new.into_entry(owner_id, new_entry_id(), now_sortable());
        self.db.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Entries of one kind, most recent first.
    pub async fn list<E: EntryRecord>(
        &self,
        ctx: &AccessContext,
        limit: Option<u32>,
    ) -> Result<Vec<E>> {
        let limit = limit.map(|l| l.clamp(1, MAX_LIST_LIMIT));
        self.db.list_entries::<E>(ctx.read_owner(), limit).await
    }

    /// Delete a workout or meal. Missing entries are not an error.
    pub async fn delete<E: EntryRecord>(&self, ctx: &AccessContext, entry_id: &str) -> Result<()> {
        let owner_id = ctx.write_owner()?;
        self.db.delete_entry::<E>(owner_id, entry_id).await?;
        Ok(())
    }

    /// Upload the photo, then write the record.
    pub async fn add_progress(
        &self,
        ctx: &AccessContext,
        new: NewProgress,
        photo: PhotoUpload,
        on_progress: ProgressFn,
    ) -> Result<ProgressEntry> {
        new.validate()?;
        let owner_id = ctx.write_owner()?;
        let entry_id = new_entry_id();

        let photo_key = self
            .photos
            .upload(
                owner_id,
                &entry_id,
                &photo.file_name,
                &photo.content_type,
                photo.bytes,
                on_progress,
            )
            .await?;

        let entry = new.into_entry(owner_id, entry_id, photo_key, now_sortable());

        if let Err(e) = self.db.add_entry(&entry).await {
            tracing::warn!(
                owner_id,
                entry_id = %entry.entry_id,
                error = %e,
                "Progress record write failed, removing uploaded photo"
            );
            if let Err(cleanup) = self.photos.delete(&entry.photo_key).await {
                tracing::error!(
                    owner_id,
                    key = %entry.photo_key,
                    error = %cleanup,
                    "Orphaned progress photo after failed record write"
                );
                return Err(AppError::Inconsistent(format!(
                    "photo {} stored without a record",
                    entry.photo_key
                )));
            }
            return Err(e);
        }

        Ok(entry)
    }

    /// Delete the record (and stats), then the photo.
    pub async fn delete_progress(&self, ctx: &AccessContext, entry_id: &str) -> Result<()> {
        let owner_id = ctx.write_owner()?;

        let Some(entry) = self
            .db
            .delete_entry::<ProgressEntry>(owner_id, entry_id)
            .await?
        else {
            return Ok(());
        };

        let Err(e) = self.photos.delete(&entry.photo_key).await else {
            return Ok(());
        };

        tracing::warn!(
            owner_id,
            entry_id,
            error = %e,
            "Photo delete failed, restoring progress record"
        );

        match self.db.add_entry(&entry).await {
            Ok(()) => Err(e),
            Err(restore) => {
                tracing::error!(
                    owner_id,
                    entry_id,
                    key = %entry.photo_key,
                    photo_error = %e,
                    restore_error = %restore,
                    "Progress record deleted but photo remains"
                );
                Err(AppError::Inconsistent(format!(
                    "progress {} deleted, photo {} remains",
                    entry_id, entry.photo_key
                )))
            }
        }
    }

    /// Signed URL for a progress entry's photo.
    pub async fn progress_photo_url(
        &self,
        ctx: &AccessContext,
        entry_id: &str,
    ) -> Result<SignedUrl> {
        let entry = self
            .db
            .get_entry::<ProgressEntry>(ctx.read_owner(), entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Progress entry {}", entry_id)))?;

        self.photos.signed_url(&entry.photo_key, None).await
    }

    /// The viewed user's aggregate (zeros if nothing was ever logged).
    pub async fn stats(&self, ctx: &AccessContext) -> Result<UserStats> {
        let owner_id = ctx.read_owner();
        Ok(self
            .db
            .get_user_stats(owner_id)
            .await?
            .unwrap_or_else(|| UserStats::for_owner(owner_id)))
    }
}
