use std::sync::LazyLock;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::util::env;
use crate::util::env::Var;
use crate::var;

pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::{PgError, PgResult, db_pool};

    pub use crate::db::models::badge::{Badge, BadgeId, BadgeType, EarnedBadge, Rarity, UserBadge};
    pub use crate::db::models::leaderboard::{Metric, Period, RankedEntry, ScoreRow};
    pub use crate::db::models::points::{
        AwardContext, PointSource, PointTransaction, SourceTotal, TransactionType,
    };
    pub use crate::db::models::stats::UserStats;
    pub use crate::db::models::streak::LearningStreak;
    pub use crate::db::models::user::{User, UserId};
    pub use crate::db::models::{PaginatedResponse, Pagination};

    pub use crate::db::repositories::Repository;
    pub use crate::db::repositories::Tx;
    pub use crate::db::repositories::badges::BadgeRepository;
    pub use crate::db::repositories::leaderboard::LeaderboardRepository;
    pub use crate::db::repositories::ledger::{LedgerError, LedgerRepository};
    pub use crate::db::repositories::stats::StatsRepository;
    pub use crate::db::repositories::streaks::StreakRepository;
    pub use crate::db::repositories::users::UserRepository;
}

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);

pub async fn db_pool() -> PgResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn new_pool() -> PgResult<Self> {
        let db_url = var!(Var::DatabaseUrl).await?;
        let pool = sqlx::PgPool::connect(db_url).await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),
}
