use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::streak::LearningStreak;
use crate::db::models::user::UserId;

pub struct StreakRepository {
    pool: &'static PgPool,
}

impl StreakRepository {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    /// Fetches the user's streak row, creating the zero-state row on first
    /// touch. Concurrent first touches collapse onto the same row via the
    /// conflict clause.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: UserId) -> SqlxResult<LearningStreak> {
        sqlx::query_as::<_, LearningStreak>(&format!(
            r#"
            INSERT INTO learning_streaks (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {}
            "#,
            sql_fragment::STREAK_FIELDS
        ))
        .bind(user_id)
        .fetch_one(self.pool)
        .await
    }

    /// Persists streak state mutated by the engine. Rows are updated in
    /// place, never deleted.
    #[instrument(skip(self, streak), fields(user = streak.user_id.0))]
    pub async fn save(&self, streak: &LearningStreak) -> SqlxResult<()> {
        sqlx::query(
            r#"
            UPDATE learning_streaks
            SET current_streak = $2,
                current_streak_start = $3,
                longest_streak = $4,
                longest_streak_start = $5,
                longest_streak_end = $6,
                last_activity_date = $7,
                total_active_days = $8,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(streak.user_id)
        .bind(streak.current_streak)
        .bind(streak.current_streak_start)
        .bind(streak.longest_streak)
        .bind(streak.longest_streak_start)
        .bind(streak.longest_streak_end)
        .bind(streak.last_activity_date)
        .bind(streak.total_active_days)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
