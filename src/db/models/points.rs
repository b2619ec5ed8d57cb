use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earned,
    Spent,
    Bonus,
    Penalty,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    QuizCompletion,
    CourseCompletion,
    LessonCompletion,
    StreakBonus,
    BadgeEarned,
    DailyLogin,
    AdminAdjustment,
}

/// One immutable row of the point ledger. `balance_after` is the user's total
/// captured at write time, never recomputed later.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointTransaction {
    pub id: i64,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub source: PointSource,
    pub points: i64,
    pub description: String,
    pub context_object_type: Option<String>,
    pub context_object_id: Option<i64>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Optional reference to the domain object that triggered a transaction or a
/// badge award.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardContext {
    pub object_type: String,
    pub object_id: i64,
}

impl AwardContext {
    pub fn new(object_type: impl Into<String>, object_id: i64) -> Self {
        Self {
            object_type: object_type.into(),
            object_id,
        }
    }
}

/// Per-source sum of earned points, for the points overview screen.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceTotal {
    pub source: PointSource,
    pub total_points: i64,
}
