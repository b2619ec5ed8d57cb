//! Pure gamification logic: balance arithmetic, streak date math, badge rule
//! evaluation and leaderboard ranking. Nothing in here touches the database,
//! which keeps the invariants testable without one.

pub mod ledger;
pub mod ranking;
pub mod rules;
pub mod streak;
