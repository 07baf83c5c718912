// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user statistics aggregates for dashboards and the admin console.
//!
//! These aggregates are updated in the same store transaction as every
//! entry add/delete, so reading a user's totals costs one document read
//! instead of a scan of all three entry collections.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Pre-computed totals for one user.
///
/// Stored at: `user_stats/{owner_id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserStats {
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub workout_count: u64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub meal_count: u64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub progress_count: u64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_calories_burned: u64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_calories_consumed: u64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_workout_minutes: u64,
    /// Last update timestamp (RFC 3339)
    #[serde(default)]
    pub updated_at: String,
}

impl UserStats {
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            ..Self::default()
        }
    }
}

/// Platform-wide totals shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlatformStats {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_users: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub active_users: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub disabled_users: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_workouts: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_meals: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_progress: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub avg_workouts_per_user: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub avg_calories_burned: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub avg_calories_consumed: u64,
}

impl PlatformStats {
    /// Fold one user's aggregate into the platform totals.
    pub fn accumulate(&mut self, stats: &UserStats, burned: &mut u64, consumed: &mut u64) {
        self.total_workouts += stats.workout_count;
        self.total_meals += stats.meal_count;
        self.total_progress += stats.progress_count;
        *burned += stats.total_calories_burned;
        *consumed += stats.total_calories_consumed;
    }

    /// Compute per-user averages (rounded to nearest) once totals are known.
    pub fn finish(&mut self, burned: u64, consumed: u64) {
        self.avg_workouts_per_user = rounded_div(self.total_workouts, self.total_users);
        self.avg_calories_burned = rounded_div(burned, self.total_users);
        self.avg_calories_consumed = rounded_div(consumed, self.total_users);
    }
}

fn rounded_div(total: u64, count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        (total + count / 2) / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_averages_round_and_handle_zero_users() {
        let mut empty = PlatformStats::default();
        empty.finish(100, 100);
        assert_eq!(empty.avg_calories_burned, 0);

        let mut stats = PlatformStats {
            total_users: 3,
            ..Default::default()
        };
        let (mut burned, mut consumed) = (0, 0);
        for workouts in [1, 2, 2] {
            let user = UserStats {
                workout_count: workouts,
                total_calories_burned: 100,
                total_calories_consumed: 500,
                ..Default::default()
            };
            stats.accumulate(&user, &mut burned, &mut consumed);
        }
        stats.finish(burned, consumed);

        assert_eq!(stats.total_workouts, 5);
        assert_eq!(stats.avg_workouts_per_user, 2);
        assert_eq!(stats.avg_calories_burned, 100);
        assert_eq!(stats.avg_calories_consumed, 500);
    }
}
