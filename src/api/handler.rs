use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::bot::{ContributionOutcome, IncomingMessage, UserProfile, Verification};
use crate::constants::{RANKING_API_MAX, RANKING_DEFAULT_LIMIT};
use crate::db::prelude::{PointEvent, RankingEntry, User, UserId};
use crate::games::challenge::DailyChallenge;

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub limit: Option<i64>,
}

impl RankingQuery {
    fn clamped(&self) -> i64 {
        self.limit
            .unwrap_or(RANKING_DEFAULT_LIMIT)
            .clamp(1, RANKING_API_MAX)
    }
}

#[instrument(skip_all, fields(user = %msg.user_id, chat = %msg.chat_id))]
pub async fn submit_contribution(
    State(state): State<Arc<AppState>>,
    Json(msg): Json<IncomingMessage>,
) -> JsonResult<ContributionOutcome> {
    for (field, value) in [
        ("user_id", &msg.user_id),
        ("chat_id", &msg.chat_id),
        ("message_id", &msg.message_id),
    ] {
        if value.trim().is_empty() {
            return Err(RouteError::InvalidRequest(format!("'{field}' must not be empty")));
        }
    }

    Ok(Json(state.bot.handle_message(&msg).await))
}

#[instrument(skip(state))]
pub async fn ranking(
    Query(param): Query<RankingQuery>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<RankingEntry>> {
    let rows = state.bot.ranking(param.clamped()).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn user_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<UserProfile> {
    match state.bot.profile(&UserId::from(id.as_str())).await? {
        Some(profile) => Ok(Json(profile)),
        None => Err(RouteError::UnknownUser(id)),
    }
}

#[instrument(skip(state))]
pub async fn user_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Vec<PointEvent>> {
    let events = state.bot.events(&UserId::from(id.as_str())).await?;
    Ok(Json(events))
}

#[instrument(skip(state))]
pub async fn verify_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Verification> {
    match state.bot.verify(&UserId::from(id.as_str())).await? {
        Some(check) => Ok(Json(check)),
        None => Err(RouteError::UnknownUser(id)),
    }
}

#[instrument(skip(state))]
pub async fn repair_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<User> {
    match state.bot.repair(&UserId::from(id.as_str())).await? {
        Some(user) => Ok(Json(user)),
        None => Err(RouteError::UnknownUser(id)),
    }
}

pub async fn daily_challenge(State(state): State<Arc<AppState>>) -> Json<DailyChallenge> {
    Json(state.bot.daily_challenge())
}

#[cfg(test)]
mod test {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::api::server::router;
    use crate::bot::Bot;
    use crate::db::prelude::MemoryLedger;
    use crate::scoring::config::ScoringConfig;

    use super::*;

    fn app() -> Router {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bot = Bot::new(&ScoringConfig::default(), Arc::new(MemoryLedger::default()), tx);

        router(Arc::new(AppState { bot: Arc::new(bot) }))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn contribute(user: &str, id: &str, text: &str) -> Request<Body> {
        let body = json!({
            "user_id": user,
            "display_name": user,
            "chat_id": "web",
            "message_id": id,
            "text": text,
        });

        Request::post("/contributions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _) = call(&app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_contribution_then_profile() {
        let app = app();

        let (status, body) = call(&app, contribute("ana", "m1", "#critica corta")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "recorded");
        assert_eq!(body["result"]["awarded_points"], 5);
        assert_eq!(body["result"]["warnings"].as_array().unwrap().len(), 1);

        let (status, body) = call(&app, get("/users/ana")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["total_points"], 5);
        assert_eq!(body["rank"], 1);
        assert_eq!(body["title"], "Novato");

        let (status, body) = call(&app, get("/users/ana/verify")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consistent"], true);

        let (_, body) = call(&app, get("/users/ana/events")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["tag"], "critica");
        assert_eq!(body[0]["points"], 5);

        let repair = Request::post("/users/ana/repair").body(Body::empty()).unwrap();
        let (status, body) = call(&app, repair).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_points"], 5);
    }

    #[tokio::test]
    async fn test_ignored_and_duplicate() {
        let app = app();

        let (_, body) = call(&app, contribute("ana", "m1", "sin etiquetas")).await;
        assert_eq!(body["status"], "ignored");

        call(&app, contribute("ana", "m2", "#serie")).await;
        let (status, body) = call(&app, contribute("ana", "m2", "#serie")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
    }

    #[tokio::test]
    async fn test_rejects_blank_ids() {
        let (status, body) = call(&app(), contribute("", "m1", "#serie")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("user_id"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let app = app();

        let (status, body) = call(&app, get("/users/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "unknown user 'nobody'");

        let (status, _) = call(&app, get("/users/nobody/verify")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ranking_limit() {
        let app = app();
        for (i, user) in ["a", "b", "c"].into_iter().enumerate() {
            call(&app, contribute(user, &format!("m{i}"), "#pelicula")).await;
        }

        let (_, body) = call(&app, get("/ranking?limit=2")).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["id"], "a");

        let (_, body) = call(&app, get("/ranking?limit=0")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = call(&app, get("/ranking")).await;
        assert_eq!(body.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_daily_challenge() {
        let (status, body) = call(&app(), get("/challenge/daily")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body["prompt"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_ranking_query_clamp() {
        assert_eq!(RankingQuery { limit: None }.clamped(), 10);
        assert_eq!(RankingQuery { limit: Some(1000) }.clamped(), 100);
        assert_eq!(RankingQuery { limit: Some(-5) }.clamped(), 1);
    }
}
