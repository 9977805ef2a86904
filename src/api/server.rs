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
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::bot::Bot;
use crate::db::prelude::LedgerError;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Debug, Clone)]
pub struct AppState {
    pub bot: Arc<Bot>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/contributions", post(submit_contribution))
        .route("/ranking", get(ranking))
        .route("/users/{id}", get(user_profile))
        .route("/users/{id}/events", get(user_events))
        .route("/users/{id}/verify", get(verify_user))
        .route("/users/{id}/repair", post(repair_user))
        .route("/challenge/daily", get(daily_challenge))
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
        .with_state(state)
}

/// Logs the `RouteError` a handler attached to its response, if any.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument(skip(bot))]
pub async fn start_server(bot: Arc<Bot>, port: u16) -> Result<Vec<JoinHandle<()>>, RouteError> {
    let app = router(Arc::new(AppState { bot }));

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", socket_addr.port()),
        "server ready"
    );

    let server_handle = tokio::task::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = ?e, "server stopped");
        }
    });

    Ok(vec![server_handle])
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    LedgerError(#[from] LedgerError),

    #[error(transparent)]
    BindError(#[from] std::io::Error),

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message, err) = match &self {
            RouteError::LedgerError(LedgerError::DuplicateEvent { .. }) => {
                (StatusCode::CONFLICT, self.to_string(), None)
            }

            RouteError::LedgerError(LedgerError::InvalidPoints(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string(), Some(self))
            }

            RouteError::LedgerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("ledger unavailable"),
                Some(self),
            ),

            RouteError::BindError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                Some(self),
            ),

            // not our server's problem
            RouteError::UnknownUser(_) => (StatusCode::NOT_FOUND, self.to_string(), None),
            RouteError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string(), None),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}
