use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use crate::api::middleware::auth::AuthedUser;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::*;
use crate::engine::ranking;
use crate::engine::rules::BadgeRule;
use crate::engine::streak;
use crate::service::{ActivityEvent, ActivityOutcome, GamificationService};

/// Badge definition annotated with the caller's standing.
#[derive(Debug, Serialize)]
pub struct AnnotatedBadge {
    #[serde(flatten)]
    pub badge: Badge,
    pub earned: bool,
    pub earned_count: i64,
    pub progress: f64,
}

#[derive(Debug, Serialize)]
pub struct BadgeDetail {
    #[serde(flatten)]
    pub badge: Badge,
    pub earned: bool,
    pub earned_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PointsOverview {
    pub total_points: i64,
    pub recent_transactions: Vec<PointTransaction>,
    pub points_by_source: Vec<SourceTotal>,
}

#[derive(Debug, Serialize)]
pub struct AchievementCheck {
    pub new_badges: Vec<Badge>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub metric: Metric,
    pub period: Period,
    pub user_rank: Option<i64>,
    pub entries: Vec<RankedEntry>,
}

/// Active badge catalog with the caller's earned/progress annotation.
/// Hidden badges stay invisible until earned. The streak stale check runs
/// first so a lapsed streak cannot inflate streak-badge progress.
#[instrument(skip(state))]
pub async fn badges_index(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<AnnotatedBadge>> {
    let badge_repo = BadgeRepository::new(state.db_pool);

    let streak_repo = StreakRepository::new(state.db_pool);
    let mut streak_row = streak_repo.get_or_create(user).await?;
    if streak::break_if_stale(&mut streak_row, Utc::now().date_naive()) {
        streak_repo.save(&streak_row).await?;
    }

    let badges = badge_repo.active().await?;
    let earned = badge_repo.earned_ids(user).await?;
    let counts = badge_repo.earned_counts().await?;
    let stats = StatsRepository::new(state.db_pool).collect(user).await?;

    let items = badges
        .into_iter()
        .filter(|badge| !badge.is_hidden || earned.contains(&badge.id))
        .map(|badge| {
            let is_earned = earned.contains(&badge.id);
            let progress = if is_earned {
                100.0
            } else {
                BadgeRule::for_badge(&badge).progress(&stats)
            };
            let earned_count = counts.get(&badge.id).copied().unwrap_or(0);

            AnnotatedBadge {
                badge,
                earned: is_earned,
                earned_count,
                progress,
            }
        })
        .collect();

    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn badge_detail(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> JsonResult<BadgeDetail> {
    let badge_repo = BadgeRepository::new(state.db_pool);

    let badge = badge_repo
        .get_by_id(&BadgeId(id))
        .await?
        .filter(|badge| badge.is_active)
        .ok_or(RouteError::UnknownBadge(id))?;

    let earned = badge_repo.has_earned(user, badge.id).await?;
    if badge.is_hidden && !earned {
        return Err(RouteError::UnknownBadge(id));
    }

    let earned_count = badge_repo.earned_count(badge.id).await?;

    Ok(Json(BadgeDetail {
        badge,
        earned,
        earned_count,
    }))
}

/// The caller's earned badges, newest first.
#[instrument(skip(state))]
pub async fn my_badges(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<EarnedBadge>> {
    let earned = BadgeRepository::new(state.db_pool).earned_by(user).await?;
    Ok(Json(earned))
}

/// Points overview: cached total, recent ledger rows, per-source totals.
#[instrument(skip(state))]
pub async fn my_points(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
) -> JsonResult<PointsOverview> {
    let total_points = UserRepository::new(state.db_pool)
        .total_points(user)
        .await?
        .ok_or(RouteError::UnknownUser(user.0))?;

    let ledger = LedgerRepository::new(state.db_pool);
    let recent_transactions = ledger.history(user, 20, 0).await?;
    let points_by_source = ledger.points_by_source(user).await?;

    Ok(Json(PointsOverview {
        total_points,
        recent_transactions,
        points_by_source,
    }))
}

#[instrument(skip(state))]
pub async fn points_history(
    AuthedUser(user): AuthedUser,
    Query(param): Query<Pagination>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<PaginatedResponse<PointTransaction>> {
    let ledger = LedgerRepository::new(state.db_pool);

    let total_items = ledger.count_for_user(user).await?;
    let items = ledger.history(user, param.limit, param.offset()).await?;

    Ok(Json(PaginatedResponse::new(
        items,
        total_items,
        param.limit,
        param.page,
    )))
}

/// Streak status. The stale check runs before the read so a lapsed streak
/// never shows as alive.
#[instrument(skip(state))]
pub async fn my_streak(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
) -> JsonResult<LearningStreak> {
    let streak_repo = StreakRepository::new(state.db_pool);

    let mut row = streak_repo.get_or_create(user).await?;
    if streak::break_if_stale(&mut row, Utc::now().date_naive()) {
        streak_repo.save(&row).await?;
    }

    Ok(Json(row))
}

#[instrument(skip(state))]
pub async fn my_stats(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
) -> JsonResult<UserStats> {
    let streak_repo = StreakRepository::new(state.db_pool);
    let mut row = streak_repo.get_or_create(user).await?;
    if streak::break_if_stale(&mut row, Utc::now().date_naive()) {
        streak_repo.save(&row).await?;
    }

    let stats = StatsRepository::new(state.db_pool).collect(user).await?;
    Ok(Json(stats))
}

/// Entry point for domain events: credits the source points, advances the
/// streak and re-checks achievements inline before responding.
#[instrument(skip(state, event))]
pub async fn record_activity(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
    Json(event): Json<ActivityEvent>,
) -> JsonResult<ActivityOutcome> {
    let outcome = GamificationService::new(state.db_pool)
        .process(user, event, Utc::now().date_naive())
        .await?;

    Ok(Json(outcome))
}

/// Explicit achievement re-check.
#[instrument(skip(state))]
pub async fn check_achievements(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
) -> JsonResult<AchievementCheck> {
    let new_badges = GamificationService::new(state.db_pool)
        .check_and_award(user, Utc::now().date_naive())
        .await?;

    Ok(Json(AchievementCheck { new_badges }))
}

/// Top-50 leaderboard for a metric/period pair, plus the caller's true rank
/// (also reported when they fall outside the visible window).
#[instrument(skip(state))]
pub async fn leaderboard(
    AuthedUser(user): AuthedUser,
    State(state): State<Arc<AppState>>,
    Path((metric, period)): Path<(Metric, Period)>,
) -> JsonResult<LeaderboardResponse> {
    let rows = LeaderboardRepository::new(state.db_pool)
        .fetch(metric, period, Utc::now())
        .await?;

    let ranked = ranking::rank_descending(rows);
    let user_rank = ranking::user_rank(user, &ranked);
    let entries = ranking::top(ranked);

    Ok(Json(LeaderboardResponse {
        metric,
        period,
        user_rank,
        entries,
    }))
}

#[cfg(test)]
mod test {
    use chrono::Duration;
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

    #[sqlx::test]
    async fn lapsed_streak_does_not_inflate_badge_progress(pool: PgPool) {
        let pool = leak(pool);
        let user = seed_user(pool).await;

        sqlx::query(
            r#"
            INSERT INTO badges (name, badge_type, requirement_value, rule)
            VALUES ('Week Warrior', 'streak', 5, '{"type": "streak_days", "days": 5}')
            "#,
        )
        .execute(pool)
        .await
        .unwrap();

        // Five consecutive active days ending a month ago.
        let streak_repo = StreakRepository::new(pool);
        let mut row = streak_repo.get_or_create(user).await.unwrap();
        let start = Utc::now().date_naive() - Duration::days(30);
        for offset in 0..5 {
            streak::record_activity(&mut row, start + Duration::days(offset)).unwrap();
        }
        streak_repo.save(&row).await.unwrap();

        let state = State(Arc::new(AppState { db_pool: pool }));
        let Json(catalog) = badges_index(AuthedUser(user), state).await.unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(!catalog[0].earned);
        assert_eq!(catalog[0].progress, 0.0);

        // The break was persisted, not just reflected in the response.
        let row = streak_repo.get_or_create(user).await.unwrap();
        assert_eq!(row.current_streak, 0);
        assert_eq!(row.longest_streak, 5);
    }
}
