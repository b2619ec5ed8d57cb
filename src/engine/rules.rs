use serde::{Deserialize, Serialize};

use crate::db::models::badge::{Badge, BadgeType};
use crate::db::models::stats::UserStats;

/// Quiz percentage treated as "mastery" by legacy badge rows that predate
/// explicit rules.
pub const LEGACY_MASTERY_PERCENTAGE: f64 = 90.0;

/// Explicit, typed award predicate for a badge.
///
/// Stored as tagged JSON on the badge row. Evaluation dispatches on the
/// variant; badge names and requirement descriptions are display text and
/// never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadgeRule {
    /// Completed course enrollments reach `count`.
    CoursesCompleted { count: i64 },
    /// Completed quiz attempts scoring at least `min_percentage` reach
    /// `count`.
    QuizMastery { min_percentage: f64, count: i64 },
    /// Live current streak reaches `days`.
    StreakDays { days: i32 },
    /// Lifetime distinct active days reach `days`.
    ActiveDays { days: i32 },
    /// Lifetime point total reaches `points`.
    PointsReached { points: i64 },
    /// Granted by an administrator; never auto-awarded.
    Manual,
}

impl BadgeRule {
    /// The badge's explicit rule, or a legacy mapping derived from
    /// `badge_type` + `requirement_value` for rows that predate the `rule`
    /// column.
    pub fn for_badge(badge: &Badge) -> BadgeRule {
        if let Some(rule) = &badge.rule {
            return rule.0.clone();
        }

        match badge.badge_type {
            BadgeType::Completion => BadgeRule::CoursesCompleted {
                count: badge.requirement_value,
            },
            BadgeType::Quiz => BadgeRule::QuizMastery {
                min_percentage: LEGACY_MASTERY_PERCENTAGE,
                count: badge.requirement_value,
            },
            BadgeType::Streak => BadgeRule::StreakDays {
                days: badge.requirement_value as i32,
            },
            BadgeType::Participation => BadgeRule::ActiveDays {
                days: badge.requirement_value as i32,
            },
            BadgeType::Milestone => BadgeRule::PointsReached {
                points: badge.requirement_value,
            },
            BadgeType::Special => BadgeRule::Manual,
        }
    }

    pub fn is_satisfied(&self, stats: &UserStats) -> bool {
        match *self {
            BadgeRule::CoursesCompleted { count } => stats.courses_completed >= count,
            BadgeRule::QuizMastery {
                min_percentage,
                count,
            } => stats.quizzes_scoring_at_least(min_percentage) >= count,
            BadgeRule::StreakDays { days } => stats.current_streak >= days,
            BadgeRule::ActiveDays { days } => stats.total_active_days >= days,
            BadgeRule::PointsReached { points } => stats.total_points >= points,
            BadgeRule::Manual => false,
        }
    }

    /// Progress towards the rule in percent, clamped to `0.0..=100.0`.
    /// Manual badges report zero until granted.
    pub fn progress(&self, stats: &UserStats) -> f64 {
        let ratio = match *self {
            BadgeRule::CoursesCompleted { count } => fraction(stats.courses_completed, count),
            BadgeRule::QuizMastery {
                min_percentage,
                count,
            } => fraction(stats.quizzes_scoring_at_least(min_percentage), count),
            BadgeRule::StreakDays { days } => {
                fraction(i64::from(stats.current_streak), i64::from(days))
            }
            BadgeRule::ActiveDays { days } => {
                fraction(i64::from(stats.total_active_days), i64::from(days))
            }
            BadgeRule::PointsReached { points } => fraction(stats.total_points, points),
            BadgeRule::Manual => 0.0,
        };

        (ratio * 100.0).clamp(0.0, 100.0)
    }
}

fn fraction(have: i64, need: i64) -> f64 {
    if need <= 0 {
        return 1.0;
    }
    have.max(0) as f64 / need as f64
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;
    use crate::db::models::badge::{BadgeId, Rarity};

    fn badge(badge_type: BadgeType, requirement_value: i64, rule: Option<BadgeRule>) -> Badge {
        let now = Utc::now();
        Badge {
            id: BadgeId(1),
            name: "Test Badge".into(),
            description: String::new(),
            icon: String::new(),
            color: String::new(),
            badge_type,
            rarity: Rarity::Common,
            points_value: 50,
            requirement_description: String::new(),
            requirement_value,
            rule: rule.map(Json),
            is_active: true,
            is_hidden: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn stats() -> UserStats {
        UserStats {
            total_points: 500,
            current_streak: 7,
            longest_streak: 12,
            total_active_days: 30,
            courses_enrolled: 5,
            courses_completed: 3,
            quizzes_completed: 4,
            badges_earned: 2,
            quiz_percentages: vec![95.0, 91.0, 80.0, 100.0],
        }
    }

    #[test]
    fn explicit_rule_takes_precedence_over_badge_type() {
        let b = badge(
            BadgeType::Completion,
            100,
            Some(BadgeRule::PointsReached { points: 400 }),
        );

        let rule = BadgeRule::for_badge(&b);
        assert_eq!(rule, BadgeRule::PointsReached { points: 400 });
        assert!(rule.is_satisfied(&stats()));
    }

    #[test]
    fn legacy_completion_counts_completed_courses() {
        let rule = BadgeRule::for_badge(&badge(BadgeType::Completion, 3, None));
        assert!(rule.is_satisfied(&stats()));

        let rule = BadgeRule::for_badge(&badge(BadgeType::Completion, 4, None));
        assert!(!rule.is_satisfied(&stats()));
    }

    #[test]
    fn legacy_quiz_rule_uses_the_mastery_threshold() {
        // Three attempts at >= 90%.
        let rule = BadgeRule::for_badge(&badge(BadgeType::Quiz, 3, None));
        assert!(rule.is_satisfied(&stats()));

        let rule = BadgeRule::for_badge(&badge(BadgeType::Quiz, 4, None));
        assert!(!rule.is_satisfied(&stats()));
    }

    #[test]
    fn streak_rule_reads_the_live_streak() {
        assert!(BadgeRule::StreakDays { days: 7 }.is_satisfied(&stats()));
        assert!(!BadgeRule::StreakDays { days: 8 }.is_satisfied(&stats()));
    }

    #[test]
    fn manual_badges_are_never_auto_awarded() {
        let rule = BadgeRule::for_badge(&badge(BadgeType::Special, 1, None));
        assert_eq!(rule, BadgeRule::Manual);
        assert!(!rule.is_satisfied(&stats()));
        assert_eq!(rule.progress(&stats()), 0.0);
    }

    #[test]
    fn progress_is_clamped_to_one_hundred() {
        let rule = BadgeRule::CoursesCompleted { count: 2 };
        assert_eq!(rule.progress(&stats()), 100.0);

        let rule = BadgeRule::CoursesCompleted { count: 6 };
        assert_eq!(rule.progress(&stats()), 50.0);
    }

    #[test]
    fn rule_json_round_trips_with_snake_case_tags() {
        let json = serde_json::json!({ "type": "quiz_mastery", "min_percentage": 85.0, "count": 2 });
        let rule: BadgeRule = serde_json::from_value(json).unwrap();
        assert_eq!(
            rule,
            BadgeRule::QuizMastery {
                min_percentage: 85.0,
                count: 2
            }
        );
    }
}
