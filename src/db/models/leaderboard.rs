use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalPoints,
    CoursesCompleted,
    QuizAverage,
    CurrentStreak,
    BadgesEarned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    AllTime,
    Monthly,
    Weekly,
    Daily,
}

impl Period {
    /// Lower bound of the window, `None` for all-time.
    ///
    /// `daily` and `monthly` are calendar-anchored (start of current day /
    /// first of current month, UTC); `weekly` is a rolling 7 days back from
    /// `now`.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::AllTime => None,
            Period::Weekly => Some(now - Duration::days(7)),
            Period::Daily => {
                let midnight = now
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .unwrap_or_else(|| now.naive_utc());
                Some(midnight.and_utc())
            }
            Period::Monthly => {
                let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
                let midnight = first.and_hms_opt(0, 0, 0).unwrap_or_else(|| now.naive_utc());
                Some(midnight.and_utc())
            }
        }
    }
}

/// Raw aggregation row fetched per metric; ordering and rank assignment
/// happen in [`crate::engine::ranking`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreRow {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub rank: i64,
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub value: f64,
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 30, 0).unwrap()
    }

    #[test]
    fn all_time_has_no_lower_bound() {
        assert_eq!(Period::AllTime.start(at(2026, 8, 25, 15)), None);
    }

    #[test]
    fn daily_starts_at_midnight_utc() {
        let start = Period::Daily.start(at(2026, 8, 25, 15)).unwrap();
        assert_eq!(start, at(2026, 8, 25, 0) - Duration::minutes(30));
    }

    #[test]
    fn monthly_starts_on_the_first() {
        let start = Period::Monthly.start(at(2026, 8, 25, 15)).unwrap();
        assert_eq!(start.date_naive().day(), 1);
        assert_eq!(start.date_naive().month(), 8);
    }

    #[test]
    fn weekly_is_a_rolling_window() {
        let now = at(2026, 8, 25, 15);
        let start = Period::Weekly.start(now).unwrap();
        assert_eq!(now - start, Duration::days(7));
    }
}
