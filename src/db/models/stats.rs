use serde::Serialize;

/// Live per-user statistics fed to the badge rule evaluator and the stats
/// endpoint. Assembled by [`crate::db::repositories::stats::StatsRepository`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserStats {
    pub total_points: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_active_days: i32,
    pub courses_enrolled: i64,
    pub courses_completed: i64,
    pub quizzes_completed: i64,
    pub badges_earned: i64,
    /// Percentages of the user's completed quiz attempts. Kept off the wire;
    /// rule evaluation needs the raw values rather than a fixed-threshold
    /// count.
    #[serde(skip_serializing)]
    pub quiz_percentages: Vec<f64>,
}

impl UserStats {
    pub fn quizzes_scoring_at_least(&self, min_percentage: f64) -> i64 {
        self.quiz_percentages
            .iter()
            .filter(|p| **p >= min_percentage)
            .count() as i64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scoring_threshold_is_inclusive() {
        let stats = UserStats {
            quiz_percentages: vec![89.9, 90.0, 95.5, 100.0],
            ..Default::default()
        };

        assert_eq!(stats.quizzes_scoring_at_least(90.0), 3);
    }

    #[test]
    fn no_attempts_clears_every_threshold_zero_times() {
        assert_eq!(UserStats::default().quizzes_scoring_at_least(0.0), 0);
    }
}
