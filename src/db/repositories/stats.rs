use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use crate::db::models::stats::UserStats;
use crate::db::models::user::UserId;

/// Assembles the live [`UserStats`] aggregate the badge evaluator and the
/// stats endpoint read. Pure reads; freshness of the streak fields is the
/// caller's concern (run the stale check first when it matters).
pub struct StatsRepository {
    pool: &'static PgPool,
}

impl StatsRepository {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn collect(&self, user_id: UserId) -> SqlxResult<UserStats> {
        let total_points = sqlx::query_scalar::<_, i64>(
            "SELECT total_points FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .unwrap_or(0);

        let streak = sqlx::query_as::<_, (i32, i32, i32)>(
            r#"
            SELECT current_streak, longest_streak, total_active_days
            FROM learning_streaks
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        let (current_streak, longest_streak, total_active_days) = streak.unwrap_or((0, 0, 0));

        let (courses_enrolled, courses_completed) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'completed')
            FROM enrollments
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        let quiz_percentages = sqlx::query_scalar::<_, f64>(
            "SELECT percentage FROM quiz_attempts WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let badges_earned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_badges WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(UserStats {
            total_points,
            current_streak,
            longest_streak,
            total_active_days,
            courses_enrolled,
            courses_completed,
            quizzes_completed: quiz_percentages.len() as i64,
            badges_earned,
            quiz_percentages,
        })
    }
}
