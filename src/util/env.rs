//! Typed snapshot of the process environment.
//!
//! Values are read once (after loading `.env` via [`dotenvy`]) and cached for
//! the lifetime of the process; callers go through the [`var!`] macro.

use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::ServerPort => &vars.server_port,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::DailyLoginPoints => &vars.daily_login_points,
    })
}

#[derive(Debug, Clone)]
pub struct Env {
    pub database_url: String,
    pub server_port: String,
    pub cors_allow_origins: String,
    pub daily_login_points: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        // A missing .env file is fine; real deployments set vars directly.
        _ = dotenvy::dotenv();

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            server_port: optional("SERVER_PORT", "8080"),
            cors_allow_origins: optional("CORS_ALLOW_ORIGINS", "*"),
            daily_login_points: optional("DAILY_LOGIN_POINTS", "10"),
        })
    }
}

fn require(key: &str) -> EnvResult<String> {
    std::env::var(key).map_err(|_| EnvErr::MissingValue(key.to_owned()))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[derive(Debug)]
pub enum Var {
    DatabaseUrl,
    ServerPort,
    CorsAllowOrigins,
    DailyLoginPoints,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("missing required environment variable '{0}'")]
    MissingValue(String),

    #[error("malformed environment variable '{0}': {1}")]
    Malformed(String, String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn optional_falls_back_to_default() {
        let port = optional("GAMIFY_TEST_UNSET_VAR", "8080");
        assert_eq!(port, "8080");
    }

    #[test]
    fn require_reports_the_missing_key() {
        let err = require("GAMIFY_TEST_UNSET_VAR").unwrap_err();
        assert!(err.to_string().contains("GAMIFY_TEST_UNSET_VAR"));
    }
}
