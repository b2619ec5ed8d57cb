use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::api::middleware::cors::cors;
use crate::db::prelude::*;
use crate::engine::ledger::BalanceError;
use crate::engine::streak::OutOfOrderActivity;
use crate::service::GamifyError;
use crate::util::env::Var;
use crate::var;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db_pool: &'static PgPool,
}

#[instrument(skip(tx))]
pub async fn router(tx: UnboundedSender<SocketAddr>) {
    let state = Arc::new(AppState {
        db_pool: db_pool().await.unwrap(),
    });

    let cors = cors().await.unwrap();

    let app = Router::new()
        .route("/", get(|| async { Response::new(Body::empty()) }))
        //
        // badge catalog
        .route("/badges", get(badges_index))
        .route("/badges/{id}", get(badge_detail))
        //
        // per-user gamification state
        .route("/me/badges", get(my_badges))
        .route("/me/points", get(my_points))
        .route("/me/points/history", get(points_history))
        .route("/me/streak", get(my_streak))
        .route("/me/stats", get(my_stats))
        .route("/me/activity", post(record_activity))
        .route("/me/achievements/check", post(check_achievements))
        //
        // rankings
        .route("/leaderboard/{metric}/{period}", get(leaderboard))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(cors)
        .with_state(state);

    let port = var!(Var::ServerPort)
        .await
        .unwrap()
        .parse::<u16>()
        .unwrap();

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await.unwrap();

    tx.send(socket_addr).unwrap();
    axum::serve(listener, app).await.unwrap()
}

/// Error trace handler for `RouteError`-type responses.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument]
pub async fn start_server(
    tx: UnboundedSender<SocketAddr>,
    mut rx: UnboundedReceiver<SocketAddr>,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting server");
    let server_handle = tokio::task::spawn(async move {
        router(tx).await;
    });

    let logging_handle = tokio::task::spawn(async move {
        while !rx.is_closed() {
            if let Some(msg) = rx.recv().await {
                tracing::info!(
                    server_url = &format!("http://127.0.0.1:{}", msg.port()),
                    "server ready"
                );
                break;
            }
        }
    });

    Ok(vec![server_handle, logging_handle])
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    QueryError(#[from] PgError),

    #[error(transparent)]
    SqlxError(#[from] sqlx::error::Error),

    #[error(transparent)]
    LedgerError(#[from] LedgerError),

    #[error(transparent)]
    GamifyError(#[from] GamifyError),

    #[error("unknown badge '{0}'")]
    UnknownBadge(i64),

    #[error("unknown user '{0}'")]
    UnknownUser(i64),

    #[error("{0}")]
    Auth(StatusCode),
}

impl RouteError {
    /// Maps the error taxonomy onto statuses: validation => 400, unknown
    /// ids => 404, missing identity => 401, the rest => 500. Conflicts
    /// (duplicate badge awards) never surface here; they are success-shaped
    /// no-ops upstream.
    fn status(&self) -> StatusCode {
        match self {
            RouteError::Auth(status) => *status,
            RouteError::UnknownBadge(_) | RouteError::UnknownUser(_) => StatusCode::NOT_FOUND,
            RouteError::SqlxError(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            RouteError::LedgerError(err) => ledger_status(err),
            RouteError::GamifyError(err) => match err {
                GamifyError::OutOfOrderActivity(OutOfOrderActivity { .. }) => {
                    StatusCode::BAD_REQUEST
                }
                GamifyError::Ledger(inner) => ledger_status(inner),
                GamifyError::Sqlx(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Balance(BalanceError::ZeroDelta)
        | LedgerError::Balance(BalanceError::Insufficient { .. }) => StatusCode::BAD_REQUEST,
        LedgerError::Sqlx(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
        LedgerError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let status = self.status();
        let message = self.to_string();

        let mut res = (status, Json(ErrorResponse { message })).into_response();
        res.extensions_mut().insert(Arc::new(self));
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insufficient_points_maps_to_bad_request() {
        let err = RouteError::LedgerError(LedgerError::Balance(BalanceError::Insufficient {
            balance: 5,
            delta: -10,
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_badge_maps_to_not_found() {
        assert_eq!(RouteError::UnknownBadge(9).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn out_of_order_activity_maps_to_bad_request() {
        let err = RouteError::GamifyError(GamifyError::OutOfOrderActivity(OutOfOrderActivity {
            date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            last: chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_identity_maps_to_unauthorized() {
        let err = RouteError::Auth(StatusCode::UNAUTHORIZED);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
