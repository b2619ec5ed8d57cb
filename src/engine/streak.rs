use chrono::NaiveDate;
use thiserror::Error;

use crate::db::models::streak::LearningStreak;

/// Points credited per streak day when a weekly milestone is hit.
const WEEKLY_BONUS_PER_DAY: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub current_streak: i32,
    /// False for a same-day repeat, which leaves the streak untouched.
    pub extended: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("activity date {date} precedes last recorded activity {last}")]
pub struct OutOfOrderActivity {
    pub date: NaiveDate,
    pub last: NaiveDate,
}

/// Records a qualifying activity on `date` and updates the streak state.
///
/// Multiple activities on one day are idempotent. A gap of more than one day
/// breaks the streak, snapshotting it into the longest-streak fields first
/// when it is a new record. Backfilled dates (before the last recorded
/// activity) are rejected without touching any state.
pub fn record_activity(
    streak: &mut LearningStreak,
    date: NaiveDate,
) -> Result<StreakUpdate, OutOfOrderActivity> {
    let mut extended = true;

    match streak.last_activity_date {
        None => {
            streak.current_streak = 1;
            streak.current_streak_start = Some(date);
            streak.total_active_days = 1;
            streak.last_activity_date = Some(date);
        }
        Some(last) => {
            let days_diff = (date - last).num_days();

            if days_diff < 0 {
                return Err(OutOfOrderActivity { date, last });
            } else if days_diff == 0 {
                extended = false;
            } else if days_diff == 1 {
                streak.current_streak += 1;
                streak.total_active_days += 1;
            } else {
                // Broken run; remember it if it was the best so far.
                if streak.current_streak > streak.longest_streak {
                    streak.longest_streak = streak.current_streak;
                    streak.longest_streak_start = streak.current_streak_start;
                    streak.longest_streak_end = Some(last);
                }

                streak.current_streak = 1;
                streak.current_streak_start = Some(date);
                streak.total_active_days += 1;
            }

            streak.last_activity_date = Some(date);
        }
    }

    // The live run may itself be the record without ever having been broken.
    if streak.current_streak > streak.longest_streak {
        streak.longest_streak = streak.current_streak;
        streak.longest_streak_start = streak.current_streak_start;
        streak.longest_streak_end = Some(date);
    }

    Ok(StreakUpdate {
        current_streak: streak.current_streak,
        extended,
    })
}

/// Force-breaks a streak that has gone stale (more than one day without
/// activity), so reads reflect reality without waiting for the next event.
/// Returns whether the streak was broken.
pub fn break_if_stale(streak: &mut LearningStreak, today: NaiveDate) -> bool {
    let Some(last) = streak.last_activity_date else {
        return false;
    };

    if (today - last).num_days() <= 1 || streak.current_streak == 0 {
        return false;
    }

    if streak.current_streak > streak.longest_streak {
        streak.longest_streak = streak.current_streak;
        streak.longest_streak_start = streak.current_streak_start;
        streak.longest_streak_end = Some(last);
    }

    streak.current_streak = 0;
    streak.current_streak_start = None;
    true
}

/// Bonus points owed when an *extending* activity lands the streak on a
/// weekly milestone: 10 points per day of the streak, every 7th day.
pub fn weekly_bonus(update: StreakUpdate) -> Option<i64> {
    if update.extended && update.current_streak > 0 && update.current_streak % 7 == 0 {
        Some(i64::from(update.current_streak) * WEEKLY_BONUS_PER_DAY)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::models::user::UserId;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn fresh() -> LearningStreak {
        LearningStreak::empty(UserId(1))
    }

    #[test]
    fn first_activity_initializes_the_streak() {
        let mut s = fresh();
        let update = record_activity(&mut s, day(1)).unwrap();

        assert_eq!(update.current_streak, 1);
        assert!(update.extended);
        assert_eq!(s.current_streak_start, Some(day(1)));
        assert_eq!(s.total_active_days, 1);
        assert_eq!(s.longest_streak, 1);
    }

    #[test]
    fn same_day_activity_is_idempotent() {
        let mut s = fresh();
        record_activity(&mut s, day(1)).unwrap();
        let once = s.clone();

        let update = record_activity(&mut s, day(1)).unwrap();

        assert!(!update.extended);
        assert_eq!(s.current_streak, once.current_streak);
        assert_eq!(s.total_active_days, once.total_active_days);
        assert_eq!(s.last_activity_date, once.last_activity_date);
    }

    #[test]
    fn consecutive_days_extend_the_streak() {
        let mut s = fresh();
        for d in 1..=5 {
            record_activity(&mut s, day(d)).unwrap();
        }

        assert_eq!(s.current_streak, 5);
        assert_eq!(s.longest_streak, 5);
        assert_eq!(s.total_active_days, 5);
        assert_eq!(s.current_streak_start, Some(day(1)));
    }

    #[test]
    fn a_gap_breaks_and_snapshots_the_record() {
        let mut s = fresh();
        for d in 1..=3 {
            record_activity(&mut s, day(d)).unwrap();
        }

        let update = record_activity(&mut s, day(5)).unwrap();

        assert_eq!(update.current_streak, 1);
        assert_eq!(s.current_streak_start, Some(day(5)));
        assert_eq!(s.longest_streak, 3);
        assert_eq!(s.longest_streak_start, Some(day(1)));
        assert_eq!(s.longest_streak_end, Some(day(3)));
        assert_eq!(s.total_active_days, 4);
    }

    #[test]
    fn a_shorter_rerun_does_not_overwrite_the_record() {
        let mut s = fresh();
        for d in 1..=4 {
            record_activity(&mut s, day(d)).unwrap();
        }
        record_activity(&mut s, day(10)).unwrap();
        record_activity(&mut s, day(11)).unwrap();

        assert_eq!(s.current_streak, 2);
        assert_eq!(s.longest_streak, 4);
        assert_eq!(s.longest_streak_end, Some(day(4)));
    }

    #[test]
    fn longest_never_less_than_current() {
        let mut s = fresh();
        let dates = [1, 2, 3, 5, 6, 7, 8, 9, 20, 21];
        for d in dates {
            record_activity(&mut s, day(d)).unwrap();
            assert!(s.longest_streak >= s.current_streak);
        }
    }

    #[test]
    fn backfilled_dates_are_rejected_without_side_effects() {
        let mut s = fresh();
        record_activity(&mut s, day(10)).unwrap();
        let before = s.clone();

        let err = record_activity(&mut s, day(8)).unwrap_err();

        assert_eq!(
            err,
            OutOfOrderActivity {
                date: day(8),
                last: day(10)
            }
        );
        assert_eq!(s.current_streak, before.current_streak);
        assert_eq!(s.last_activity_date, before.last_activity_date);
        assert_eq!(s.total_active_days, before.total_active_days);
    }

    #[test]
    fn stale_streak_is_force_broken() {
        let mut s = fresh();
        for d in 1..=3 {
            record_activity(&mut s, day(d)).unwrap();
        }

        assert!(break_if_stale(&mut s, day(5)));

        assert_eq!(s.current_streak, 0);
        assert_eq!(s.current_streak_start, None);
        assert_eq!(s.longest_streak, 3);
        assert_eq!(s.longest_streak_end, Some(day(3)));
        // The last activity date is history, not streak state.
        assert_eq!(s.last_activity_date, Some(day(3)));
    }

    #[test]
    fn yesterdays_activity_is_not_stale() {
        let mut s = fresh();
        record_activity(&mut s, day(4)).unwrap();

        assert!(!break_if_stale(&mut s, day(5)));
        assert_eq!(s.current_streak, 1);
    }

    #[test]
    fn stale_check_on_an_empty_streak_is_a_noop() {
        let mut s = fresh();
        assert!(!break_if_stale(&mut s, day(5)));
    }

    #[test]
    fn weekly_bonus_fires_on_multiples_of_seven() {
        let update = |n, extended| StreakUpdate {
            current_streak: n,
            extended,
        };

        assert_eq!(weekly_bonus(update(7, true)), Some(70));
        assert_eq!(weekly_bonus(update(14, true)), Some(140));
        assert_eq!(weekly_bonus(update(6, true)), None);
        assert_eq!(weekly_bonus(update(8, true)), None);
        // Same-day repeat on day 7 must not double-pay.
        assert_eq!(weekly_bonus(update(7, false)), None);
    }
}
