use std::collections::{HashMap, HashSet};

use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::badge::{Badge, BadgeId, EarnedBadge, UserBadge};
use crate::db::models::points::{AwardContext, PointSource, TransactionType};
use crate::db::models::user::UserId;
use crate::db::prelude::Tx;
use crate::db::repositories::Repository;
use crate::db::repositories::ledger::LedgerError;

#[derive(Debug)]
pub struct BadgeRepository {
    pool: &'static PgPool,
}

#[async_trait::async_trait]
impl Repository for BadgeRepository {
    type Ident = BadgeId;
    type Output = Badge;

    const BASE_FIELDS: &'static str = sql_fragment::BADGE_FIELDS;
    const TABLE_NAME: &'static str = "badges";

    fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static PgPool {
        self.pool
    }
}

impl BadgeRepository {
    /// All active badge definitions, grouped the way the catalog displays
    /// them.
    #[instrument(skip(self))]
    pub async fn active(&self) -> SqlxResult<Vec<Badge>> {
        sqlx::query_as::<_, Badge>(&format!(
            "SELECT {} FROM badges WHERE is_active ORDER BY badge_type, name",
            Self::BASE_FIELDS
        ))
        .fetch_all(self.pool)
        .await
    }

    /// Ids of the badges a user has already earned.
    #[instrument(skip(self))]
    pub async fn earned_ids(&self, user_id: UserId) -> SqlxResult<HashSet<BadgeId>> {
        let ids = sqlx::query_scalar::<_, BadgeId>(
            "SELECT badge_id FROM user_badges WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// The user's earned badges joined with their definitions, newest first.
    #[instrument(skip(self))]
    pub async fn earned_by(&self, user_id: UserId) -> SqlxResult<Vec<EarnedBadge>> {
        sqlx::query_as::<_, EarnedBadge>(
            r#"
            SELECT
                b.id AS badge_id,
                b.name,
                b.description,
                b.icon,
                b.color,
                b.badge_type,
                b.rarity,
                ub.earned_at,
                ub.points_awarded
            FROM user_badges ub
            JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id = $1
            ORDER BY ub.earned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn has_earned(&self, user_id: UserId, badge_id: BadgeId) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM user_badges WHERE user_id = $1 AND badge_id = $2)",
        )
        .bind(user_id)
        .bind(badge_id)
        .fetch_one(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn earned_count(&self, badge_id: BadgeId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_badges WHERE badge_id = $1")
            .bind(badge_id)
            .fetch_one(self.pool)
            .await
    }

    /// Earned counts for every badge in one pass, for catalog annotation.
    #[instrument(skip(self))]
    pub async fn earned_counts(&self) -> SqlxResult<HashMap<BadgeId, i64>> {
        let rows = sqlx::query_as::<_, (BadgeId, i64)>(
            "SELECT badge_id, COUNT(*) FROM user_badges GROUP BY badge_id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Awards `badge` to the user: join row plus the `badge_earned` ledger
    /// credit in one transaction. Returns `None` when the badge was already
    /// earned; a concurrent duplicate award loses the unique-constraint race
    /// and is treated as success with nothing to do.
    #[instrument(skip(self, badge), fields(user = user_id.0, badge = badge.id.0))]
    pub async fn award(
        &self,
        user_id: UserId,
        badge: &Badge,
    ) -> Result<Option<UserBadge>, LedgerError> {
        let context = AwardContext::new("badge", badge.id.0);

        Tx::with_tx(self.pool, |mut tx| async move {
            let result = async {
                let Some(user_badge) = tx.insert_user_badge(user_id, badge, Some(&context)).await?
                else {
                    return Ok(None);
                };

                if badge.points_value > 0 {
                    tx.record_transaction(
                        user_id,
                        TransactionType::Earned,
                        PointSource::BadgeEarned,
                        badge.points_value,
                        &format!("Badge earned: {}", badge.name),
                        Some(&context),
                    )
                    .await?;
                }

                Ok(Some(user_badge))
            }
            .await;

            (tx, result)
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use sqlx::PgPool;

    use super::*;

    fn leak(pool: PgPool) -> &'static PgPool {
        Box::leak(Box::new(pool))
    }

    async fn seed_user(pool: &PgPool) -> UserId {
        sqlx::query_scalar::<_, UserId>(
            "INSERT INTO users (username, display_name) VALUES ('maya', 'Maya') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_badge(pool: &PgPool) -> BadgeId {
        sqlx::query_scalar::<_, BadgeId>(
            r#"
            INSERT INTO badges (name, badge_type, points_value, rule)
            VALUES (
                'Point Collector',
                'milestone',
                25,
                '{"type": "points_reached", "points": 50}'
            )
            RETURNING id
            "#,
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn duplicate_award_is_a_quiet_noop(pool: PgPool) {
        let pool = leak(pool);
        let user = seed_user(pool).await;
        let id = seed_badge(pool).await;

        let repo = BadgeRepository::new(pool);
        let badge = repo.get_by_id(&id).await.unwrap().unwrap();

        assert!(repo.award(user, &badge).await.unwrap().is_some());
        assert!(repo.award(user, &badge).await.unwrap().is_none());

        assert_eq!(repo.earned_count(id).await.unwrap(), 1);

        // The badge's point credit landed exactly once.
        let total = sqlx::query_scalar::<_, i64>("SELECT total_points FROM users WHERE id = $1")
            .bind(user)
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(total, badge.points_value);
    }
}
