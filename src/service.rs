use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use crate::db::prelude::*;
use crate::engine::rules::BadgeRule;
use crate::engine::streak::{self, OutOfOrderActivity};
use crate::util::env::{EnvErr, Var};
use crate::var;

/// A domain event that counts as learning activity. Quiz/lesson/course
/// events arrive from their owning services once the primary record (score,
/// completion) has been committed there.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    QuizCompleted {
        quiz_id: i64,
        score: i64,
        total_possible: i64,
    },
    LessonCompleted {
        lesson_id: i64,
        points: i64,
    },
    CourseCompleted {
        course_id: i64,
        points: i64,
    },
    DailyLogin,
}

#[derive(Debug, Serialize)]
pub struct ActivityOutcome {
    pub points_awarded: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub streak_bonus: Option<i64>,
    pub new_badges: Vec<Badge>,
    /// The achievement re-check is best-effort; a failure there never undoes
    /// the activity's primary credit.
    pub badge_check_failed: bool,
}

#[derive(Debug, Error)]
pub enum GamifyError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    OutOfOrderActivity(#[from] OutOfOrderActivity),

    #[error(transparent)]
    Env(#[from] EnvErr),
}

/// Score as a percentage of the attainable total, the figure quiz badges
/// and leaderboards consume.
pub fn quiz_percentage(score: i64, total_possible: i64) -> f64 {
    if total_possible <= 0 {
        return 0.0;
    }
    score as f64 / total_possible as f64 * 100.0
}

/// Runs the gamification side of a domain event: source-point credit, streak
/// update (with weekly bonus), then a badge re-check.
pub struct GamificationService {
    pool: &'static PgPool,
}

impl GamificationService {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, event), fields(user = user_id.0))]
    pub async fn process(
        &self,
        user_id: UserId,
        event: ActivityEvent,
        today: NaiveDate,
    ) -> Result<ActivityOutcome, GamifyError> {
        let ledger = LedgerRepository::new(self.pool);

        let points_awarded = self.credit_event(&ledger, user_id, &event, today).await?;

        let streaks = StreakRepository::new(self.pool);
        let mut streak_row = streaks.get_or_create(user_id).await?;
        let update = streak::record_activity(&mut streak_row, today)?;
        if update.extended {
            streaks.save(&streak_row).await?;
        }

        let streak_bonus = match streak::weekly_bonus(update) {
            Some(bonus) => {
                ledger
                    .record(
                        user_id,
                        TransactionType::Bonus,
                        PointSource::StreakBonus,
                        bonus,
                        &format!("Weekly streak bonus: {} days", update.current_streak),
                        None,
                    )
                    .await?;
                Some(bonus)
            }
            None => None,
        };

        let (new_badges, badge_check_failed) = match self.check_and_award(user_id, today).await {
            Ok(badges) => (badges, false),
            Err(e) => {
                tracing::error!(error = ?e, user = user_id.0, "achievement check failed after activity");
                (Vec::new(), true)
            }
        };

        Ok(ActivityOutcome {
            points_awarded,
            current_streak: streak_row.current_streak,
            longest_streak: streak_row.longest_streak,
            streak_bonus,
            new_badges,
            badge_check_failed,
        })
    }

    /// Re-evaluates every unearned active badge against live statistics and
    /// awards the satisfied ones. Idempotent: a second call with no new
    /// activity awards nothing.
    #[instrument(skip(self), fields(user = user_id.0))]
    pub async fn check_and_award(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<Badge>, GamifyError> {
        let streaks = StreakRepository::new(self.pool);
        let mut streak_row = streaks.get_or_create(user_id).await?;
        if streak::break_if_stale(&mut streak_row, today) {
            streaks.save(&streak_row).await?;
        }

        let mut stats = StatsRepository::new(self.pool).collect(user_id).await?;
        let badges = BadgeRepository::new(self.pool);
        let earned = badges.earned_ids(user_id).await?;

        let mut newly_awarded = Vec::new();
        for badge in badges.active().await? {
            if earned.contains(&badge.id) {
                continue;
            }

            if !BadgeRule::for_badge(&badge).is_satisfied(&stats) {
                continue;
            }

            // None means a concurrent check got there first; skip quietly.
            if badges.award(user_id, &badge).await?.is_some() {
                // Keep the in-pass view consistent so milestone rules see the
                // credit from earlier awards in the same sweep.
                stats.total_points += badge.points_value;
                stats.badges_earned += 1;
                newly_awarded.push(badge);
            }
        }

        if !newly_awarded.is_empty() {
            tracing::info!(
                user = user_id.0,
                count = newly_awarded.len(),
                "awarded new badges"
            );
        }

        Ok(newly_awarded)
    }

    async fn credit_event(
        &self,
        ledger: &LedgerRepository,
        user_id: UserId,
        event: &ActivityEvent,
        today: NaiveDate,
    ) -> Result<i64, GamifyError> {
        match event {
            ActivityEvent::QuizCompleted {
                quiz_id,
                score,
                total_possible,
            } => {
                if *score <= 0 {
                    return Ok(0);
                }
                let percentage = quiz_percentage(*score, *total_possible);
                ledger
                    .record(
                        user_id,
                        TransactionType::Earned,
                        PointSource::QuizCompletion,
                        *score,
                        &format!("Quiz completed ({percentage:.1}%)"),
                        Some(AwardContext::new("quiz", *quiz_id)),
                    )
                    .await?;
                Ok(*score)
            }
            ActivityEvent::LessonCompleted { lesson_id, points } => {
                if *points <= 0 {
                    return Ok(0);
                }
                ledger
                    .record(
                        user_id,
                        TransactionType::Earned,
                        PointSource::LessonCompletion,
                        *points,
                        "Lesson completed",
                        Some(AwardContext::new("lesson", *lesson_id)),
                    )
                    .await?;
                Ok(*points)
            }
            ActivityEvent::CourseCompleted { course_id, points } => {
                if *points <= 0 {
                    return Ok(0);
                }
                ledger
                    .record(
                        user_id,
                        TransactionType::Earned,
                        PointSource::CourseCompletion,
                        *points,
                        "Course completed",
                        Some(AwardContext::new("course", *course_id)),
                    )
                    .await?;
                Ok(*points)
            }
            ActivityEvent::DailyLogin => {
                // At most one login credit per calendar day.
                if ledger
                    .has_source_on_day(user_id, PointSource::DailyLogin, today)
                    .await?
                {
                    return Ok(0);
                }

                let points = var!(Var::DailyLoginPoints)
                    .await?
                    .parse::<i64>()
                    .map_err(|e| {
                        EnvErr::Malformed("DAILY_LOGIN_POINTS".to_owned(), e.to_string())
                    })?;
                if points <= 0 {
                    return Ok(0);
                }

                ledger
                    .record(
                        user_id,
                        TransactionType::Earned,
                        PointSource::DailyLogin,
                        points,
                        "Daily login",
                        None,
                    )
                    .await?;
                Ok(points)
            }
        }
    }
}
