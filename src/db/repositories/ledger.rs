use chrono::NaiveDate;
use sqlx::{PgPool, Result as SqlxResult};
use thiserror::Error;
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::points::{
    AwardContext, PointSource, PointTransaction, SourceTotal, TransactionType,
};
use crate::db::models::user::UserId;
use crate::db::prelude::Tx;
use crate::engine::ledger::BalanceError;

/// Append-only point ledger. Rows are written inside a transaction together
/// with the user's cached `total_points` and are never mutated afterwards.
pub struct LedgerRepository {
    pool: &'static PgPool,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Balance(#[from] BalanceError),
}

impl LedgerRepository {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    /// Records one transaction atomically: ledger append + cached-total
    /// update commit together or not at all.
    #[instrument(skip(self, description, context), fields(user = user_id.0))]
    pub async fn record(
        &self,
        user_id: UserId,
        transaction_type: TransactionType,
        source: PointSource,
        points: i64,
        description: &str,
        context: Option<AwardContext>,
    ) -> Result<PointTransaction, LedgerError> {
        Tx::with_tx(self.pool, |mut tx| async move {
            let result = tx
                .record_transaction(
                    user_id,
                    transaction_type,
                    source,
                    points,
                    description,
                    context.as_ref(),
                )
                .await;

            (tx, result)
        })
        .await
    }

    /// Newest-first page of a user's transaction history.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> SqlxResult<Vec<PointTransaction>> {
        sqlx::query_as::<_, PointTransaction>(&format!(
            r#"
            SELECT {}
            FROM point_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            sql_fragment::TRANSACTION_FIELDS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn count_for_user(&self, user_id: UserId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM point_transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await
    }

    /// Per-source totals of earned points, largest first.
    #[instrument(skip(self))]
    pub async fn points_by_source(&self, user_id: UserId) -> SqlxResult<Vec<SourceTotal>> {
        sqlx::query_as::<_, SourceTotal>(
            r#"
            SELECT source, SUM(points)::BIGINT AS total_points
            FROM point_transactions
            WHERE user_id = $1
              AND transaction_type = 'earned'
            GROUP BY source
            ORDER BY total_points DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await
    }

    /// Whether a transaction from `source` was already recorded on `day`
    /// (UTC). Used to keep daily-login credits to one per calendar day.
    #[instrument(skip(self))]
    pub async fn has_source_on_day(
        &self,
        user_id: UserId,
        source: PointSource,
        day: NaiveDate,
    ) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM point_transactions
                WHERE user_id = $1
                  AND source = $2
                  AND (created_at AT TIME ZONE 'UTC')::DATE = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(source)
        .bind(day)
        .fetch_one(self.pool)
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

    async fn cached_total(pool: &PgPool, user_id: UserId) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT total_points FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn balance_after_chains_across_credits_and_debits(pool: PgPool) {
        let pool = leak(pool);
        let user = seed_user(pool).await;
        let ledger = LedgerRepository::new(pool);

        let deltas = [
            (TransactionType::Earned, 100),
            (TransactionType::Earned, 25),
            (TransactionType::Spent, -30),
            (TransactionType::Bonus, 7),
        ];

        let mut running = 0;
        for (transaction_type, delta) in deltas {
            running += delta;
            let row = ledger
                .record(
                    user,
                    transaction_type,
                    PointSource::AdminAdjustment,
                    delta,
                    "adjustment",
                    None,
                )
                .await
                .unwrap();
            assert_eq!(row.balance_after, running);
        }

        // The cached total always equals the last balance_after snapshot.
        assert_eq!(cached_total(pool, user).await, running);

        let history = ledger.history(user, 10, 0).await.unwrap();
        assert_eq!(history.len(), deltas.len());
        assert_eq!(history[0].balance_after, running);
    }

    #[sqlx::test]
    async fn overdraft_rolls_back_without_a_ledger_row(pool: PgPool) {
        let pool = leak(pool);
        let user = seed_user(pool).await;
        let ledger = LedgerRepository::new(pool);

        ledger
            .record(
                user,
                TransactionType::Earned,
                PointSource::AdminAdjustment,
                10,
                "seed credit",
                None,
            )
            .await
            .unwrap();

        let err = ledger
            .record(
                user,
                TransactionType::Spent,
                PointSource::AdminAdjustment,
                -11,
                "over-spend",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Balance(BalanceError::Insufficient { .. })
        ));

        assert_eq!(ledger.count_for_user(user).await.unwrap(), 1);
        assert_eq!(cached_total(pool, user).await, 10);
    }
}
