use crate::db::models::leaderboard::{RankedEntry, ScoreRow};
use crate::db::models::user::UserId;

/// Visible leaderboard window.
pub const LEADERBOARD_SIZE: usize = 50;

/// Orders score rows strictly descending by value with a deterministic
/// tie-break (ascending user id) and assigns 1-based positional ranks over
/// the *full* set. Callers truncate to [`LEADERBOARD_SIZE`] for display but
/// keep the full list so [`user_rank`] reports a true global rank.
pub fn rank_descending(mut rows: Vec<ScoreRow>) -> Vec<RankedEntry> {
    rows.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(core::cmp::Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| RankedEntry {
            rank: idx as i64 + 1,
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            value: row.value,
        })
        .collect()
}

pub fn user_rank(user_id: UserId, ranked: &[RankedEntry]) -> Option<i64> {
    ranked
        .iter()
        .find(|entry| entry.user_id == user_id)
        .map(|entry| entry.rank)
}

pub fn top(mut ranked: Vec<RankedEntry>) -> Vec<RankedEntry> {
    ranked.truncate(LEADERBOARD_SIZE);
    ranked
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(id: i64, value: f64) -> ScoreRow {
        ScoreRow {
            user_id: UserId(id),
            username: format!("user{id}"),
            display_name: format!("User {id}"),
            value,
        }
    }

    #[test]
    fn orders_strictly_descending() {
        let ranked = rank_descending(vec![row(1, 10.0), row(2, 30.0), row(3, 20.0)]);

        let order: Vec<i64> = ranked.iter().map(|e| e.user_id.0).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn rank_one_holds_the_maximum() {
        let ranked = rank_descending(vec![row(5, 7.0), row(9, 99.0), row(2, 42.0)]);
        assert_eq!(ranked[0].value, 99.0);
    }

    #[test]
    fn ties_break_by_ascending_user_id() {
        let ranked = rank_descending(vec![row(7, 50.0), row(3, 50.0), row(5, 50.0)]);

        let order: Vec<i64> = ranked.iter().map(|e| e.user_id.0).collect();
        assert_eq!(order, vec![3, 5, 7]);
    }

    #[test]
    fn window_truncates_but_rank_survives() {
        let rows = (1..=60).map(|id| row(id, f64::from(200 - id as i32))).collect();
        let ranked = rank_descending(rows);

        assert_eq!(user_rank(UserId(55), &ranked), Some(55));

        let visible = top(ranked);
        assert_eq!(visible.len(), LEADERBOARD_SIZE);
        assert!(visible.iter().all(|e| e.user_id.0 <= 50));
    }

    #[test]
    fn missing_user_is_unranked() {
        let ranked = rank_descending(vec![row(1, 1.0)]);
        assert_eq!(user_rank(UserId(2), &ranked), None);
    }
}
