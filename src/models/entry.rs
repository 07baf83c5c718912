// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout, meal and progress entries owned by one user.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::db::collections;
use crate::models::stats::UserStats;

/// A record addressed by (owner id, entry id).
///
/// Implemented by every entry kind so the store can handle them with one
/// set of typed operations.
pub trait EntryRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the entries live in.
    const COLLECTION: &'static str;
    /// Human-readable kind, used in logs and error messages.
    const KIND: &'static str;

    fn owner_id(&self) -> &str;
    fn entry_id(&self) -> &str;
    fn created_at(&self) -> &str;

    /// Fold this entry into (or out of) the owner's aggregate.
    fn apply_to_stats(&self, stats: &mut UserStats, direction: StatsDirection);
}

/// Whether an entry is being added to or removed from the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsDirection {
    Add,
    Remove,
}

impl StatsDirection {
    fn apply(self, total: &mut u64, amount: u64) {
        match self {
            StatsDirection::Add => *total = total.saturating_add(amount),
            StatsDirection::Remove => *total = total.saturating_sub(amount),
        }
    }
}

// ─── Workouts ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    Strength,
    Cardio,
    Hiit,
    Yoga,
    Swimming,
    Cycling,
    Other,
}

/// One exercise inside a workout. Free-form, as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Exercise {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub sets: String,
    #[serde(default)]
    pub reps: String,
    #[serde(default)]
    pub weight: String,
}

/// Stored workout record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WorkoutEntry {
    pub owner_id: String,
    pub entry_id: String,
    pub workout_type: WorkoutType,
    pub name: String,
    /// Duration in minutes
    pub duration_minutes: u32,
    pub calories: u32,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub notes: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub created_at: String,
}

/// Client-supplied fields for a new workout.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWorkout {
    pub workout_type: WorkoutType,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(range(max = 1440, message = "Duration must be at most 1440 minutes"))]
    pub duration_minutes: u32,
    #[validate(range(max = 20000, message = "Calories must be at most 20000"))]
    pub calories: u32,
    #[serde(default)]
    #[validate(nested, length(max = 50))]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: String,
    pub date: NaiveDate,
}

impl NewWorkout {
    pub fn into_entry(self, owner_id: &str, entry_id: String, created_at: String) -> WorkoutEntry {
        WorkoutEntry {
            owner_id: owner_id.to_string(),
            entry_id,
            workout_type: self.workout_type,
            name: self.name,
            duration_minutes: self.duration_minutes,
            calories: self.calories,
            exercises: self.exercises,
            notes: self.notes,
            date: self.date,
            created_at,
        }
    }
}

impl EntryRecord for WorkoutEntry {
    const COLLECTION: &'static str = collections::WORKOUTS;
    const KIND: &'static str = "workout";

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
    fn entry_id(&self) -> &str {
        &self.entry_id
    }
    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn apply_to_stats(&self, stats: &mut UserStats, direction: StatsDirection) {
        direction.apply(&mut stats.workout_count, 1);
        direction.apply(&mut stats.total_calories_burned, u64::from(self.calories));
        direction.apply(&mut stats.total_workout_minutes, u64::from(self.duration_minutes));
    }
}

// ─── Meals ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// Stored meal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MealEntry {
    pub owner_id: String,
    pub entry_id: String,
    pub name: String,
    pub meal_type: MealType,
    pub calories: u32,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    pub created_at: String,
}

/// Client-supplied fields for a new meal.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMeal {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub meal_type: MealType,
    #[validate(range(max = 20000, message = "Calories must be at most 20000"))]
    pub calories: u32,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2000.0))]
    pub protein_g: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2000.0))]
    pub carbs_g: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2000.0))]
    pub fat_g: f64,
    pub date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: String,
}

impl NewMeal {
    pub fn into_entry(self, owner_id: &str, entry_id: String, created_at: String) -> MealEntry {
        MealEntry {
            owner_id: owner_id.to_string(),
            entry_id,
            name: self.name,
            meal_type: self.meal_type,
            calories: self.calories,
            protein_g: self.protein_g,
            carbs_g: self.carbs_g,
            fat_g: self.fat_g,
            date: self.date,
            notes: self.notes,
            created_at,
        }
    }
}

impl EntryRecord for MealEntry {
    const COLLECTION: &'static str = collections::MEALS;
    const KIND: &'static str = "meal";

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
    fn entry_id(&self) -> &str {
        &self.entry_id
    }
    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn apply_to_stats(&self, stats: &mut UserStats, direction: StatsDirection) {
        direction.apply(&mut stats.meal_count, 1);
        direction.apply(&mut stats.total_calories_consumed, u64::from(self.calories));
    }
}

// ─── Progress ───────────────────────────────────────────────

/// Optional body measurements (inches).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Measurements {
    #[validate(range(min = 0.0, max = 200.0))]
    pub chest: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub waist: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub hips: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub arms: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub thighs: Option<f64>,
}

/// Stored progress record. The photo lives in object storage under `photo_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressEntry {
    pub owner_id: String,
    pub entry_id: String,
    pub photo_key: String,
    pub weight: Option<f64>,
    pub body_fat_percent: Option<f64>,
    #[serde(default)]
    pub measurements: Measurements,
    #[serde(default)]
    pub notes: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub created_at: String,
}

/// Client-supplied fields for a new progress entry (the photo travels separately).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProgress {
    #[validate(range(min = 0.0, max = 2000.0, message = "Weight is out of range"))]
    pub weight: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Body fat must be 0-100%"))]
    pub body_fat_percent: Option<f64>,
    #[serde(default)]
    #[validate(nested)]
    pub measurements: Measurements,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: String,
    pub date: NaiveDate,
}

impl NewProgress {
    pub fn into_entry(
        self,
        owner_id: &str,
        entry_id: String,
        photo_key: String,
        created_at: String,
    ) -> ProgressEntry {
        ProgressEntry {
            owner_id: owner_id.to_string(),
            entry_id,
            photo_key,
            weight: self.weight,
            body_fat_percent: self.body_fat_percent,
            measurements: self.measurements,
            notes: self.notes,
            date: self.date,
            created_at,
        }
    }
}

impl EntryRecord for ProgressEntry {
    const COLLECTION: &'static str = collections::PROGRESS;
    const KIND: &'static str = "progress";

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
    fn entry_id(&self) -> &str {
        &self.entry_id
    }
    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn apply_to_stats(&self, stats: &mut UserStats, direction: StatsDirection) {
        direction.apply(&mut stats.progress_count, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workout(calories: u32, minutes: u32) -> WorkoutEntry {
        NewWorkout {
            workout_type: WorkoutType::Cardio,
            name: "Run".to_string(),
            duration_minutes: minutes,
            calories,
            exercises: vec![],
            notes: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
        .into_entry("user-1", "w-1".to_string(), "2024-06-01T10:00:00.000000Z".to_string())
    }

    #[test]
    fn test_workout_stats_add_and_remove() {
        let mut stats = UserStats::default();
        let entry = workout(300, 30);

        entry.apply_to_stats(&mut stats, StatsDirection::Add);
        assert_eq!(stats.workout_count, 1);
        assert_eq!(stats.total_calories_burned, 300);
        assert_eq!(stats.total_workout_minutes, 30);

        entry.apply_to_stats(&mut stats, StatsDirection::Remove);
        assert_eq!(stats.workout_count, 0);
        assert_eq!(stats.total_calories_burned, 0);
    }

    #[test]
    fn test_remove_saturates_at_zero() {
        let mut stats = UserStats::default();
        workout(300, 30).apply_to_stats(&mut stats, StatsDirection::Remove);
        assert_eq!(stats.workout_count, 0);
        assert_eq!(stats.total_calories_burned, 0);
    }

    #[test]
    fn test_workout_type_serializes_lowercase() {
        let json = serde_json::to_string(&WorkoutType::Hiit).unwrap();
        assert_eq!(json, "\"hiit\"");
        let parsed: MealType = serde_json::from_str("\"snack\"").unwrap();
        assert_eq!(parsed, MealType::Snack);
    }

    #[test]
    fn test_new_workout_validation_rejects_empty_name() {
        let new = NewWorkout {
            workout_type: WorkoutType::Yoga,
            name: String::new(),
            duration_minutes: 10,
            calories: 50,
            exercises: vec![],
            notes: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        let errors = new.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }
}
