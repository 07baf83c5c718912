// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Entries (workouts, meals, progress) keyed by owner id + entry id
//! - User stats aggregates (updated atomically with entry writes)
//! - Users (profile storage keyed by email)
//! - Sessions (server-side rows backing session credentials)
//! - Platform settings (lockdown flag, admin roster)

use crate::db::collections;
use crate::db::memory::{DocWrite, MemoryDocs};
use crate::db::platform_docs;
use crate::error::AppError;
use crate::models::{
    AdminRoster, EntryRecord, LockdownSetting, SessionRecord, StatsDirection, UserProfile,
    UserStats,
};
use crate::time_utils::now_sortable;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Storage backend behind [`FirestoreDb`].
#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<MemoryDocs>),
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

/// Document ID for an entry: owner and entry id, each URL-encoded.
pub fn entry_doc_id(owner_id: &str, entry_id: &str) -> String {
    format!(
        "{}_{}",
        urlencoding::encode(owner_id),
        urlencoding::encode(entry_id)
    )
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create an in-memory store (local development and tests).
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryDocs::new())),
        }
    }

    /// Make in-memory document reads fail. No effect on Firestore.
    pub fn simulate_read_failures(&self, on: bool) {
        if let Backend::Memory(docs) = &self.backend {
            docs.fail_reads(on);
        }
    }

    /// Let `writes` more in-memory writes succeed, then fail the rest
    /// (`None` clears). No effect on Firestore.
    pub fn simulate_write_failures_after(&self, writes: Option<u32>) {
        if let Backend::Memory(docs) = &self.backend {
            docs.fail_writes_after(writes);
        }
    }

    // ─── Generic Document Helpers ────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collection)
                .obj()
                .one(id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(docs) => docs
                .get(collection, id)
                .await?
                .map(from_value)
                .transpose(),
        }
    }

    async fn put_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + for<'de> serde::Deserialize<'de> + Sync + Send,
    {
        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(id)
                    .object(doc)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            Backend::Memory(docs) => docs.put(collection, id, to_value(doc)?).await?,
        }
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            Backend::Memory(docs) => docs.delete(collection, id).await?,
        }
        Ok(())
    }

    /// Query documents whose `owner_field` is `owner_id`, newest first.
    async fn query_by_owner<T>(
        &self,
        collection: &str,
        owner_field: &'static str,
        owner_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        match &self.backend {
            Backend::Firestore(client) => {
                let owner = owner_id.to_string();
                let query = client
                    .fluent()
                    .select()
                    .from(collection)
                    .filter(move |q| q.for_all([q.field(owner_field).eq(owner.clone())]))
                    .order_by([(
                        "created_at",
                        firestore::FirestoreQueryDirection::Descending,
                    )]);

                let query = match limit {
                    Some(limit) => query.limit(limit),
                    None => query,
                };

                query
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            }
            Backend::Memory(docs) => docs
                .query_eq_desc(
                    collection,
                    owner_field,
                    owner_id,
                    "created_at",
                    limit.map(|l| l as usize),
                )
                .await
                .into_iter()
                .map(from_value)
                .collect(),
        }
    }

    /// One page of a whole collection, ordered ascending by `order_field`.
    async fn scan_page<T>(
        &self,
        collection: &str,
        order_field: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .from(collection)
                .order_by([(order_field, firestore::FirestoreQueryDirection::Ascending)])
                .limit(limit)
                .offset(offset)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(docs) => docs
                .scan_page(collection, order_field, limit as usize, offset as usize)
                .await
                .into_iter()
                .map(from_value)
                .collect(),
        }
    }

    // ─── Entry Operations ────────────────────────────────────────

    /// Store a new entry and fold it into the owner's stats in one transaction.
    ///
    /// The stats document is read inside the transaction, so concurrent
    /// writers for the same owner retry instead of overwriting each other.
    pub async fn add_entry<E: EntryRecord>(&self, entry: &E) -> Result<(), AppError> {
        let owner_id = entry.owner_id();
        let doc_id = entry_doc_id(owner_id, entry.entry_id());

        match &self.backend {
            Backend::Firestore(client) => {
                let entry = entry.clone();
                client
                    .run_transaction(move |db, transaction| {
                        let entry = entry.clone();
                        let doc_id = doc_id.clone();
                        Box::pin(async move {
                            let owner_id = entry.owner_id().to_string();
                            let stored: Option<UserStats> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::USER_STATS)
                                .obj()
                                .one(&owner_id)
                                .await?;
                            let mut stats =
                                stored.unwrap_or_else(|| UserStats::for_owner(&owner_id));
                            entry.apply_to_stats(&mut stats, StatsDirection::Add);
                            stats.updated_at = now_sortable();

                            db.fluent()
                                .update()
                                .in_col(E::COLLECTION)
                                .document_id(&doc_id)
                                .object(&entry)
                                .add_to_transaction(transaction)?;
                            db.fluent()
                                .update()
                                .in_col(collections::USER_STATS)
                                .document_id(&owner_id)
                                .object(&stats)
                                .add_to_transaction(transaction)?;

                            Ok(())
                        })
                    })
                    .await
                    .map_err(|e| AppError::Database(format!("Entry write failed: {}", e)))?;
            }
            Backend::Memory(docs) => {
                let entry_doc = to_value(entry)?;
                docs.transact(|view| {
                    let mut stats = view
                        .get(collections::USER_STATS, owner_id)
                        .cloned()
                        .map(from_value::<UserStats>)
                        .transpose()?
                        .unwrap_or_else(|| UserStats::for_owner(owner_id));
                    entry.apply_to_stats(&mut stats, StatsDirection::Add);
                    stats.updated_at = now_sortable();

                    Ok((
                        vec![
                            DocWrite::Put {
                                collection: E::COLLECTION,
                                id: doc_id,
                                doc: entry_doc,
                            },
                            DocWrite::Put {
                                collection: collections::USER_STATS,
                                id: owner_id.to_string(),
                                doc: to_value(&stats)?,
                            },
                        ],
                        (),
                    ))
                })
                .await?;
            }
        }

        tracing::debug!(
            owner_id,
            entry_id = entry.entry_id(),
            kind = E::KIND,
            "Entry stored"
        );
        Ok(())
    }

    /// List an owner's entries, most recent first.
    pub async fn list_entries<E: EntryRecord>(
        &self,
        owner_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<E>, AppError> {
        self.query_by_owner(E::COLLECTION, "owner_id", owner_id, limit)
            .await
    }

    /// Get a single entry by composite key.
    pub async fn get_entry<E: EntryRecord>(
        &self,
        owner_id: &str,
        entry_id: &str,
    ) -> Result<Option<E>, AppError> {
        self.get_doc(E::COLLECTION, &entry_doc_id(owner_id, entry_id))
            .await
    }

    /// Delete an entry and remove it from the owner's stats in one transaction.
    ///
    /// Returns the deleted entry, or `None` if it did not exist (nothing is
    /// written in that case, so repeated deletes are harmless). The entry
    /// and stats are read inside the transaction, so two concurrent deletes
    /// of the same entry subtract it once.
    pub async fn delete_entry<E: EntryRecord>(
        &self,
        owner_id: &str,
        entry_id: &str,
    ) -> Result<Option<E>, AppError> {
        let doc_id = entry_doc_id(owner_id, entry_id);

        let deleted = match &self.backend {
            Backend::Firestore(client) => {
                let owner = owner_id.to_string();
                client
                    .run_transaction(move |db, transaction| {
                        let owner_id = owner.clone();
                        let doc_id = doc_id.clone();
                        Box::pin(async move {
                            let found: Option<E> = db
                                .fluent()
                                .select()
                                .by_id_in(E::COLLECTION)
                                .obj()
                                .one(&doc_id)
                                .await?;
                            let Some(entry) = found else {
                                return Ok(None);
                            };

                            let stored: Option<UserStats> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::USER_STATS)
                                .obj()
                                .one(&owner_id)
                                .await?;
                            let mut stats =
                                stored.unwrap_or_else(|| UserStats::for_owner(&owner_id));
                            entry.apply_to_stats(&mut stats, StatsDirection::Remove);
                            stats.updated_at = now_sortable();

                            db.fluent()
                                .delete()
                                .from(E::COLLECTION)
                                .document_id(&doc_id)
                                .add_to_transaction(transaction)?;
                            db.fluent()
                                .update()
                                .in_col(collections::USER_STATS)
                                .document_id(&owner_id)
                                .object(&stats)
                                .add_to_transaction(transaction)?;

                            Ok(Some(entry))
                        })
                    })
                    .await
                    .map_err(|e| AppError::Database(format!("Entry delete failed: {}", e)))?
            }
            Backend::Memory(docs) => {
                docs.transact(|view| {
                    let Some(found) = view.get(E::COLLECTION, &doc_id).cloned() else {
                        return Ok((Vec::new(), None));
                    };
                    let entry: E = from_value(found)?;

                    let mut stats = view
                        .get(collections::USER_STATS, owner_id)
                        .cloned()
                        .map(from_value::<UserStats>)
                        .transpose()?
                        .unwrap_or_else(|| UserStats::for_owner(owner_id));
                    entry.apply_to_stats(&mut stats, StatsDirection::Remove);
                    stats.updated_at = now_sortable();

                    Ok((
                        vec![
                            DocWrite::Delete {
                                collection: E::COLLECTION,
                                id: doc_id.clone(),
                            },
                            DocWrite::Put {
                                collection: collections::USER_STATS,
                                id: owner_id.to_string(),
                                doc: to_value(&stats)?,
                            },
                        ],
                        Some(entry),
                    ))
                })
                .await?
            }
        };

        match &deleted {
            Some(_) => tracing::debug!(owner_id, entry_id, kind = E::KIND, "Entry deleted"),
            None => tracing::debug!(owner_id, entry_id, kind = E::KIND, "Entry already absent"),
        }
        Ok(deleted)
    }

    // ─── User Stats Operations ──────────────────────────────────

    /// Get user stats aggregate document.
    pub async fn get_user_stats(&self, owner_id: &str) -> Result<Option<UserStats>, AppError> {
        self.get_doc(collections::USER_STATS, owner_id).await
    }

    /// One page of all stats aggregates, ordered by owner id.
    pub async fn list_user_stats_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserStats>, AppError> {
        self.scan_page(collections::USER_STATS, "owner_id", limit, offset)
            .await
    }

    // ─── User Profile Operations ────────────────────────────────

    /// Get a user profile by normalized email.
    pub async fn get_profile(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_doc(collections::USERS, email).await
    }

    /// Record a successful sign-in.
    ///
    /// Creates the profile on first sign-in. Otherwise only the login
    /// fields are written (`subject_id`, `last_login_at`, `updated_at`, and
    /// `name` when non-empty), so a concurrent admin change to `disabled`
    /// is never overwritten.
    pub async fn record_login(
        &self,
        email: &str,
        subject_id: &str,
        name: &str,
    ) -> Result<UserProfile, AppError> {
        let now = now_sortable();

        match &self.backend {
            Backend::Firestore(client) => {
                let email = email.to_string();
                let subject_id = subject_id.to_string();
                let name = name.to_string();
                client
                    .run_transaction(move |db, transaction| {
                        let email = email.clone();
                        let subject_id = subject_id.clone();
                        let name = name.clone();
                        let now = now.clone();
                        Box::pin(async move {
                            let stored: Option<UserProfile> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::USERS)
                                .obj()
                                .one(&email)
                                .await?;

                            let (profile, fields) =
                                login_update(stored, &email, &subject_id, &name, now);
                            let update = db.fluent().update();
                            let update = match fields {
                                Some(fields) => update.fields(fields),
                                None => update,
                            };
                            update
                                .in_col(collections::USERS)
                                .document_id(&email)
                                .object(&profile)
                                .add_to_transaction(transaction)?;

                            Ok(profile)
                        })
                    })
                    .await
                    .map_err(|e| AppError::Database(format!("Login update failed: {}", e)))
            }
            Backend::Memory(docs) => {
                docs.transact(|view| {
                    let stored = view
                        .get(collections::USERS, email)
                        .cloned()
                        .map(from_value::<UserProfile>)
                        .transpose()?;
                    let (profile, _) = login_update(stored, email, subject_id, name, now);
                    Ok((
                        vec![DocWrite::Put {
                            collection: collections::USERS,
                            id: email.to_string(),
                            doc: to_value(&profile)?,
                        }],
                        profile,
                    ))
                })
                .await
            }
        }
    }

    /// Create or replace a user profile.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.put_doc(collections::USERS, &profile.email, profile)
            .await
    }

    /// One page of all profiles, ordered by email.
    pub async fn list_profiles_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserProfile>, AppError> {
        self.scan_page(collections::USERS, "email", limit, offset)
            .await
    }

    // ─── Session Operations ─────────────────────────────────────

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError> {
        self.get_doc(collections::SESSIONS, session_id).await
    }

    pub async fn create_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        self.put_doc(collections::SESSIONS, &session.session_id, session)
            .await
    }

    /// A user's session rows, newest first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, AppError> {
        self.query_by_owner(collections::SESSIONS, "user_id", user_id, None)
            .await
    }

    /// Delete a session row. Missing rows are not an error.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::SESSIONS, session_id).await
    }

    // ─── Platform Settings ──────────────────────────────────────

    /// Read the lockdown flag. A missing document means "not locked down".
    pub async fn get_lockdown(&self) -> Result<LockdownSetting, AppError> {
        Ok(self
            .get_doc(collections::PLATFORM, platform_docs::LOCKDOWN)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_lockdown(&self, setting: &LockdownSetting) -> Result<(), AppError> {
        self.put_doc(collections::PLATFORM, platform_docs::LOCKDOWN, setting)
            .await
    }

    /// Read the stored admin roster. A missing document means an empty roster.
    pub async fn get_admin_roster(&self) -> Result<AdminRoster, AppError> {
        Ok(self
            .get_doc(collections::PLATFORM, platform_docs::ADMINS)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_admin_roster(&self, roster: &AdminRoster) -> Result<(), AppError> {
        self.put_doc(collections::PLATFORM, platform_docs::ADMINS, roster)
            .await
    }
}

/// Apply a sign-in to the stored profile.
///
/// Returns the resulting profile and, for an existing profile, the field
/// mask naming what the sign-in changed.
fn login_update(
    stored: Option<UserProfile>,
    email: &str,
    subject_id: &str,
    name: &str,
    now: String,
) -> (UserProfile, Option<Vec<String>>) {
    match stored {
        Some(mut profile) => {
            let mut fields =
                firestore::paths!(UserProfile::{subject_id, last_login_at, updated_at});
            profile.subject_id = subject_id.to_string();
            if !name.is_empty() {
                profile.name = name.to_string();
                fields.push(firestore::path!(UserProfile::name));
            }
            profile.last_login_at = now.clone();
            profile.updated_at = now;
            (profile, Some(fields))
        }
        None => (
            UserProfile {
                email: email.to_string(),
                subject_id: subject_id.to_string(),
                name: name.to_string(),
                disabled: false,
                created_at: now.clone(),
                last_login_at: now.clone(),
                updated_at: now,
            },
            None,
        ),
    }
}

fn to_value<T: Serialize + ?Sized>(doc: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(doc)
        .map_err(|e| AppError::Database(format!("Failed to encode document: {}", e)))
}

fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Database(format!("Failed to decode document: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MealEntry, MealType, WorkoutEntry, WorkoutType};
    use chrono::NaiveDate;

    fn workout(owner: &str, id: &str, created_at: &str, calories: u32) -> WorkoutEntry {
        WorkoutEntry {
            owner_id: owner.to_string(),
            entry_id: id.to_string(),
            workout_type: WorkoutType::Cardio,
            name: "Run".to_string(),
            duration_minutes: 30,
            calories,
            exercises: vec![],
            notes: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_entry_doc_id_encodes_parts() {
        assert_eq!(entry_doc_id("a/b", "c d"), "a%2Fb_c%20d");
    }

    #[tokio::test]
    async fn test_add_list_delete_updates_stats() {
        let db = FirestoreDb::new_in_memory();
        db.add_entry(&workout("u1", "w1", "2024-06-01T10:00:00.000000Z", 200))
            .await
            .unwrap();
        db.add_entry(&workout("u1", "w2", "2024-06-02T10:00:00.000000Z", 300))
            .await
            .unwrap();
        db.add_entry(&workout("u2", "w3", "2024-06-03T10:00:00.000000Z", 999))
            .await
            .unwrap();

        let listed: Vec<WorkoutEntry> = db.list_entries("u1", None).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|w| w.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["w2", "w1"]);

        let stats = db.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.workout_count, 2);
        assert_eq!(stats.total_calories_burned, 500);

        let removed = db.delete_entry::<WorkoutEntry>("u1", "w2").await.unwrap();
        assert!(removed.is_some());
        let again = db.delete_entry::<WorkoutEntry>("u1", "w2").await.unwrap();
        assert!(again.is_none());

        let stats = db.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.workout_count, 1);
        assert_eq!(stats.total_calories_burned, 200);
    }

    #[tokio::test]
    async fn test_entry_kinds_use_separate_collections() {
        let db = FirestoreDb::new_in_memory();
        db.add_entry(&workout("u1", "same-id", "2024-06-01T10:00:00.000000Z", 100))
            .await
            .unwrap();

        let meals: Vec<MealEntry> = db.list_entries("u1", None).await.unwrap();
        assert!(meals.is_empty());
        assert!(db
            .delete_entry::<MealEntry>("u1", "same-id")
            .await
            .unwrap()
            .is_none());

        let meal = MealEntry {
            owner_id: "u1".to_string(),
            entry_id: "m1".to_string(),
            name: "Oats".to_string(),
            meal_type: MealType::Breakfast,
            calories: 350,
            protein_g: 12.0,
            carbs_g: 60.0,
            fat_g: 6.0,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            notes: String::new(),
            created_at: "2024-06-01T08:00:00.000000Z".to_string(),
        };
        db.add_entry(&meal).await.unwrap();
        let stats = db.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.workout_count, 1);
        assert_eq!(stats.meal_count, 1);
        assert_eq!(stats.total_calories_consumed, 350);
    }

    #[tokio::test]
    async fn test_platform_defaults_when_missing() {
        let db = FirestoreDb::new_in_memory();
        assert!(!db.get_lockdown().await.unwrap().enabled);
        assert!(db.get_admin_roster().await.unwrap().admin_emails.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_and_deletes_keep_stats_exact() {
        let db = FirestoreDb::new_in_memory();

        let adds: Vec<_> = (0..32)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    let created_at = format!("2024-06-01T10:00:{:02}.000000Z", i);
                    db.add_entry(&workout("u1", &format!("w{}", i), &created_at, 10))
                        .await
                })
            })
            .collect();
        for add in adds {
            add.await.unwrap().unwrap();
        }

        let stats = db.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.workout_count, 32);
        assert_eq!(stats.total_calories_burned, 320);

        // Racing deletes of the same entries subtract each one once
        let deletes: Vec<_> = (0..32)
            .flat_map(|i| [i, i])
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.delete_entry::<WorkoutEntry>("u1", &format!("w{}", i))
                        .await
                })
            })
            .collect();
        let mut removed = 0;
        for delete in deletes {
            if delete.await.unwrap().unwrap().is_some() {
                removed += 1;
            }
        }
        assert_eq!(removed, 32);

        let stats = db.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.workout_count, 0);
        assert_eq!(stats.total_calories_burned, 0);
    }

    #[tokio::test]
    async fn test_record_login_keeps_admin_fields() {
        let db = FirestoreDb::new_in_memory();
        let first = db
            .record_login("jo@example.com", "sub-1", "Jo")
            .await
            .unwrap();
        assert!(!first.disabled);

        // A disable lands between two sign-ins
        let mut disabled = first.clone();
        disabled.disabled = true;
        db.upsert_profile(&disabled).await.unwrap();

        let second = db
            .record_login("jo@example.com", "sub-1", "")
            .await
            .unwrap();
        assert!(second.disabled);
        assert_eq!(second.name, "Jo");
        assert_eq!(second.created_at, first.created_at);

        let stored = db.get_profile("jo@example.com").await.unwrap().unwrap();
        assert!(stored.disabled);
    }

    #[test]
    fn test_login_update_masks_only_login_fields() {
        let (created, mask) =
            login_update(None, "jo@example.com", "sub", "Jo", "t1".to_string());
        assert!(mask.is_none());
        assert_eq!(created.created_at, "t1");

        let (updated, mask) =
            login_update(Some(created), "jo@example.com", "sub", "", "t2".to_string());
        let mask = mask.unwrap();
        assert!(!mask.iter().any(|f| f == "disabled" || f == "created_at" || f == "name"));
        assert!(mask.iter().any(|f| f == "last_login_at"));
        assert_eq!(updated.last_login_at, "t2");
        assert_eq!(updated.created_at, "t1");
    }
}
