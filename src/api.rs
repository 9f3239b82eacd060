use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::freshness::Status;
use crate::jobs;
use crate::store::NewsStore;
use crate::tracker::{NewsTracker, TopicOptions};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<NewsTracker>,
    pub store: Arc<NewsStore>,
    pub result_limit: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/topics", get(topics))
        .route("/last-update", get(last_update))
        .route("/news/{topic}/{tier}", get(news_by_tier))
        .route("/force-update", post(force_update))
        .route("/add-topic", post(add_topic))
        .route("/remove-topic", delete(remove_topic))
        .route("/news/read", post(mark_read))
        .route("/news/delete", delete(delete_news))
        .layer(CorsLayer::very_permissive())
        .layer(CompressionLayer::new())
        .with_state(state)
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

fn not_found(detail: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "detail": detail })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "ts": chrono::Utc::now().timestamp() }))
}

async fn topics(State(state): State<AppState>) -> Json<Value> {
    ok(json!(state.tracker.topic_names()))
}

async fn last_update(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "last_update": state.tracker.last_updated(),
    }))
}

async fn news_by_tier(
    State(state): State<AppState>,
    Path((topic, tier)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !state.tracker.contains_topic(&topic) {
        return Err(not_found("topic not tracked"));
    }
    let filter = match tier.as_str() {
        "all" => None,
        other => Some(
            other
                .parse::<Status>()
                .map_err(|_| not_found("unknown freshness tier"))?,
        ),
    };
    let items = state.store.query_by_topic(&topic, filter);
    Ok(ok(json!(items)))
}

async fn force_update(State(state): State<AppState>) -> Json<Value> {
    if let Err(e) = jobs::fetch_and_store(&state.tracker, &state.store, state.result_limit).await {
        tracing::warn!(error = ?e, "forced update failed");
    }
    Json(json!({ "status": "success" }))
}

#[derive(serde::Deserialize)]
struct AddTopicParams {
    topic: String,
    #[serde(default = "default_region")]
    region: String,
}

fn default_region() -> String {
    "US".to_string()
}

async fn add_topic(
    State(state): State<AppState>,
    Query(params): Query<AddTopicParams>,
) -> Json<Value> {
    let region = params.region.to_uppercase();
    if state.tracker.contains_topic(&params.topic) {
        return Json(json!({ "status": "exists", "region": region }));
    }
    state
        .tracker
        .register_topic(&params.topic, &region, TopicOptions::default());
    Json(json!({ "status": "success", "region": region }))
}

#[derive(serde::Deserialize)]
struct TopicParam {
    topic: String,
}

async fn remove_topic(
    State(state): State<AppState>,
    Query(params): Query<TopicParam>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .tracker
        .remove_topic(&params.topic)
        .map_err(|_| not_found("topic not found"))?;
    Ok(Json(json!({ "status": "success" })))
}

#[derive(serde::Deserialize)]
struct LinkParam {
    link: String,
}

async fn mark_read(
    State(state): State<AppState>,
    Query(params): Query<LinkParam>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !state.store.mark_read(&params.link) {
        return Err(not_found("link not found"));
    }
    Ok(Json(json!({ "status": "success" })))
}

async fn delete_news(
    State(state): State<AppState>,
    Query(params): Query<LinkParam>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.store.delete_by_link(&params.link) {
        Ok(true) => Ok(Json(json!({ "status": "success" }))),
        Ok(false) => Err(not_found("link not found")),
        Err(e) => {
            tracing::warn!(error = ?e, "delete failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "detail": "delete failed" })),
            ))
        }
    }
}
