use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::user::UserId;

/// Learning streak state, one row per user.
///
/// Invariant: `longest_streak >= current_streak` after every update, and
/// `current_streak_start` is null exactly when `current_streak` is 0.
/// The consecutive-day arithmetic lives in [`crate::engine::streak`].
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LearningStreak {
    pub user_id: UserId,
    pub current_streak: i32,
    pub current_streak_start: Option<NaiveDate>,
    pub longest_streak: i32,
    pub longest_streak_start: Option<NaiveDate>,
    pub longest_streak_end: Option<NaiveDate>,
    pub last_activity_date: Option<NaiveDate>,
    pub total_active_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearningStreak {
    /// A fresh zero-state row, used by tests and as the pre-insert default.
    pub fn empty(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            current_streak: 0,
            current_streak_start: None,
            longest_streak: 0,
            longest_streak_start: None,
            longest_streak_end: None,
            last_activity_date: None,
            total_active_days: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
