// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod entry;
pub mod platform;
pub mod stats;
pub mod user;

pub use entry::{
    EntryRecord, Exercise, MealEntry, MealType, Measurements, NewMeal, NewProgress, NewWorkout,
    ProgressEntry, StatsDirection, WorkoutEntry, WorkoutType,
};
pub use platform::{AdminRoster, LockdownSetting};
pub use stats::{PlatformStats, UserStats};
pub use user::{SessionRecord, UserProfile};
