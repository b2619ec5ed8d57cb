use core::fmt;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Result as SqlxResult, Transaction};
use tracing::instrument;

use crate::db::models::badge::{Badge, UserBadge};
use crate::db::models::points::{AwardContext, PointSource, PointTransaction, TransactionType};
use crate::db::models::user::UserId;
use crate::db::repositories::ledger::LedgerError;
use crate::engine::ledger::apply_delta;

pub mod badges;
pub mod leaderboard;
pub mod ledger;
pub mod stats;
pub mod streaks;
pub mod users;

/// Thin wrapper over a postgres transaction carrying the ledger-affecting
/// write primitives. Everything that touches `users.total_points` goes
/// through [`Tx::record_transaction`] so the row lock, the balance check,
/// the ledger append and the cached-total update commit together.
pub struct Tx<'a> {
    inner: Option<Transaction<'a, Postgres>>,
}

impl<'a> Tx<'a> {
    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on
    /// `Err`.
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T, E>(pool: &'static PgPool, f: F) -> Result<T, E>
    where
        F: FnOnce(Tx<'a>) -> Fut,
        Fut: Future<Output = (Tx<'a>, Result<T, E>)>,
        E: From<sqlx::Error>,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = ?rb, "rollback failure after failed transaction");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(pool))]
    pub async fn begin(pool: &'static PgPool) -> SqlxResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await
        } else {
            Err(sqlx::Error::Protocol(
                "transaction already completed".into(),
            ))
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await
        } else {
            Err(sqlx::Error::Protocol(
                "transaction already completed".into(),
            ))
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'a, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("transaction already completed".into()))
    }

    /// Row-locks the user's cached point total for the duration of the
    /// transaction.
    #[instrument(skip(self))]
    pub async fn lock_user_total(&mut self, user_id: UserId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT total_points FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **self.inner_mut()?)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    #[instrument(skip(self))]
    pub async fn set_user_total(&mut self, user_id: UserId, total: i64) -> SqlxResult<()> {
        sqlx::query("UPDATE users SET total_points = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(total)
            .execute(&mut **self.inner_mut()?)
            .await?;

        Ok(())
    }

    /// Appends one ledger row and adjusts the user's cached total to match.
    ///
    /// Rejects zero deltas and any debit that would drive the total negative;
    /// on rejection nothing in the transaction has been written.
    #[instrument(skip(self, description, context), fields(user = user_id.0, points))]
    pub async fn record_transaction(
        &mut self,
        user_id: UserId,
        transaction_type: TransactionType,
        source: PointSource,
        points: i64,
        description: &str,
        context: Option<&AwardContext>,
    ) -> Result<PointTransaction, LedgerError> {
        let balance = self.lock_user_total(user_id).await?;
        let balance_after = apply_delta(balance, points)?;

        let row = sqlx::query_as::<_, PointTransaction>(
            r#"
            INSERT INTO point_transactions (
                user_id,
                transaction_type,
                source,
                points,
                description,
                context_object_type,
                context_object_id,
                balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                user_id,
                transaction_type,
                source,
                points,
                description,
                context_object_type,
                context_object_id,
                balance_after,
                created_at
            "#,
        )
        .bind(user_id)
        .bind(transaction_type)
        .bind(source)
        .bind(points)
        .bind(description)
        .bind(context.map(|c| c.object_type.clone()))
        .bind(context.map(|c| c.object_id))
        .bind(balance_after)
        .fetch_one(&mut **self.inner_mut()?)
        .await?;

        self.set_user_total(user_id, balance_after).await?;

        Ok(row)
    }

    /// Inserts the (user, badge) join row, returning `None` when the badge
    /// was already earned (the unique constraint makes the loser of a
    /// concurrent double-award a no-op rather than an error).
    #[instrument(skip(self, badge, context), fields(user = user_id.0, badge = badge.id.0))]
    pub async fn insert_user_badge(
        &mut self,
        user_id: UserId,
        badge: &Badge,
        context: Option<&AwardContext>,
    ) -> SqlxResult<Option<UserBadge>> {
        sqlx::query_as::<_, UserBadge>(
            r#"
            INSERT INTO user_badges (
                user_id,
                badge_id,
                points_awarded,
                context_object_type,
                context_object_id
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            RETURNING
                id,
                user_id,
                badge_id,
                earned_at,
                points_awarded,
                context_object_type,
                context_object_id
            "#,
        )
        .bind(user_id)
        .bind(badge.id)
        .bind(badge.points_value)
        .bind(context.map(|c| c.object_type.clone()))
        .bind(context.map(|c| c.object_id))
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }
}

pub mod sql_fragment {
    pub const USER_FIELDS: &str = r#"
        id,
        username,
        display_name,
        total_points,
        is_active,
        created_at,
        updated_at
    "#;

    pub const BADGE_FIELDS: &str = r#"
        id,
        name,
        description,
        icon,
        color,
        badge_type,
        rarity,
        points_value,
        requirement_description,
        requirement_value,
        rule,
        is_active,
        is_hidden,
        created_at,
        updated_at
    "#;

    pub const TRANSACTION_FIELDS: &str = r#"
        id,
        user_id,
        transaction_type,
        source,
        points,
        description,
        context_object_type,
        context_object_id,
        balance_after,
        created_at
    "#;

    pub const STREAK_FIELDS: &str = r#"
        user_id,
        current_streak,
        current_streak_start,
        longest_streak,
        longest_streak_start,
        longest_streak_end,
        last_activity_date,
        total_active_days,
        created_at,
        updated_at
    "#;
}

#[async_trait]
pub trait Repository {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, <Postgres as sqlx::Database>::Row>
        + Sized
        + Unpin
        + Send
        + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;

    fn new(pool: &'static PgPool) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &'static PgPool;

    async fn exists(&self, id: &Self::Ident) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
    }

    #[instrument(skip(self, id))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
