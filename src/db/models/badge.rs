use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::user::UserId;
use crate::engine::rules::BadgeRule;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct BadgeId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "badge_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
    Completion,
    Streak,
    Quiz,
    Participation,
    Special,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "badge_rarity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Static badge definition. Admin-owned, read-only to the evaluator.
///
/// `rule` is the explicit award predicate; rows migrated from older data may
/// leave it null, in which case a legacy mapping from `badge_type` and
/// `requirement_value` applies (see [`BadgeRule::for_badge`]).
/// `requirement_description` is display text only and never drives control
/// flow.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Badge {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub badge_type: BadgeType,
    pub rarity: Rarity,
    pub points_value: i64,
    pub requirement_description: String,
    pub requirement_value: i64,
    pub rule: Option<Json<BadgeRule>>,
    pub is_active: bool,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Join record: one per (user, badge), enforced by a unique constraint.
/// `points_awarded` snapshots the badge's value at award time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserBadge {
    pub id: i64,
    pub user_id: UserId,
    pub badge_id: BadgeId,
    pub earned_at: DateTime<Utc>,
    pub points_awarded: i64,
    pub context_object_type: Option<String>,
    pub context_object_id: Option<i64>,
}

/// An earned badge joined with its definition, for the "my badges" timeline.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EarnedBadge {
    pub badge_id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub badge_type: BadgeType,
    pub rarity: Rarity,
    pub earned_at: DateTime<Utc>,
    pub points_awarded: i64,
}

impl From<i64> for BadgeId {
    fn from(value: i64) -> Self {
        BadgeId(value)
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
