use chrono::{DateTime, Utc};
use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use crate::db::models::leaderboard::{Metric, Period, ScoreRow};

/// Fetches the per-metric aggregation rows a leaderboard is built from.
/// Ordering, tie-breaking and rank assignment happen in
/// [`crate::engine::ranking`]; these queries only decide who qualifies and
/// with what value.
pub struct LeaderboardRepository {
    pool: &'static PgPool,
}

impl LeaderboardRepository {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    /// Qualifying users and their metric value for the given window.
    ///
    /// Users with nothing to show (zero period points, no completions, no
    /// attempts, zero streak) are excluded rather than scored as zero. The
    /// period is ignored for `current_streak`, which is only meaningful live.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        metric: Metric,
        period: Period,
        now: DateTime<Utc>,
    ) -> SqlxResult<Vec<ScoreRow>> {
        let start = period.start(now);

        match metric {
            Metric::TotalPoints => match start {
                None => self.total_points_all_time().await,
                Some(start) => self.total_points_since(start).await,
            },
            Metric::CoursesCompleted => self.courses_completed(start).await,
            Metric::QuizAverage => self.quiz_average(start).await,
            Metric::CurrentStreak => self.current_streak().await,
            Metric::BadgesEarned => self.badges_earned(start).await,
        }
    }

    async fn total_points_all_time(&self) -> SqlxResult<Vec<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT id AS user_id, username, display_name, total_points::FLOAT8 AS value
            FROM users
            WHERE is_active AND total_points > 0
            "#,
        )
        .fetch_all(self.pool)
        .await
    }

    async fn total_points_since(&self, start: DateTime<Utc>) -> SqlxResult<Vec<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.display_name,
                   SUM(pt.points)::FLOAT8 AS value
            FROM users u
            JOIN point_transactions pt ON pt.user_id = u.id
            WHERE u.is_active AND pt.created_at >= $1
            GROUP BY u.id, u.username, u.display_name
            HAVING SUM(pt.points) > 0
            "#,
        )
        .bind(start)
        .fetch_all(self.pool)
        .await
    }

    async fn courses_completed(&self, start: Option<DateTime<Utc>>) -> SqlxResult<Vec<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.display_name,
                   COUNT(e.id)::FLOAT8 AS value
            FROM users u
            JOIN enrollments e ON e.user_id = u.id
            WHERE u.is_active
              AND e.status = 'completed'
              AND ($1::TIMESTAMPTZ IS NULL OR e.completed_at >= $1)
            GROUP BY u.id, u.username, u.display_name
            HAVING COUNT(e.id) > 0
            "#,
        )
        .bind(start)
        .fetch_all(self.pool)
        .await
    }

    async fn quiz_average(&self, start: Option<DateTime<Utc>>) -> SqlxResult<Vec<ScoreRow>> {
        // Users with no qualifying attempts are excluded, not scored as 0.
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.display_name,
                   AVG(qa.percentage)::FLOAT8 AS value
            FROM users u
            JOIN quiz_attempts qa ON qa.user_id = u.id
            WHERE u.is_active
              AND qa.status = 'completed'
              AND ($1::TIMESTAMPTZ IS NULL OR qa.completed_at >= $1)
            GROUP BY u.id, u.username, u.display_name
            "#,
        )
        .bind(start)
        .fetch_all(self.pool)
        .await
    }

    async fn current_streak(&self) -> SqlxResult<Vec<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.display_name,
                   ls.current_streak::FLOAT8 AS value
            FROM users u
            JOIN learning_streaks ls ON ls.user_id = u.id
            WHERE u.is_active AND ls.current_streak > 0
            "#,
        )
        .fetch_all(self.pool)
        .await
    }

    async fn badges_earned(&self, start: Option<DateTime<Utc>>) -> SqlxResult<Vec<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.display_name,
                   COUNT(ub.id)::FLOAT8 AS value
            FROM users u
            JOIN user_badges ub ON ub.user_id = u.id
            WHERE u.is_active
              AND ($1::TIMESTAMPTZ IS NULL OR ub.earned_at >= $1)
            GROUP BY u.id, u.username, u.display_name
            HAVING COUNT(ub.id) > 0
            "#,
        )
        .bind(start)
        .fetch_all(self.pool)
        .await
    }
}
