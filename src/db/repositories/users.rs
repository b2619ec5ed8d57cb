use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::user::{User, UserId};
use crate::db::repositories::Repository;

#[derive(Debug)]
pub struct UserRepository {
    pool: &'static PgPool,
}

#[async_trait::async_trait]
impl Repository for UserRepository {
    type Ident = UserId;
    type Output = User;

    const BASE_FIELDS: &'static str = sql_fragment::USER_FIELDS;
    const TABLE_NAME: &'static str = "users";

    fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static PgPool {
        self.pool
    }
}

impl UserRepository {
    #[instrument(skip(self))]
    pub async fn total_points(&self, user_id: UserId) -> SqlxResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT total_points FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await
    }
}
