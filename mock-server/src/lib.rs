//! A stand-in for the remote API, used by integration tests.
//!
//! Signed endpoints verify `signature` and `t` against the route's path
//! template, exactly as the real service does, and reject a timestamp they
//! have already seen. The remaining endpoints return the awkward responses
//! a client must classify: an empty object, a non-JSON body, a 201, a 302.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::get,
    Form, Json, Router,
};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEVICE_ID: &str = "mock-device";
pub const API_KEY: &str = "mock-key";
pub const API_SECRET: &str = "mock-secret";

/// The identity and credentials the server expects signed requests to use.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub device_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            device_id: DEVICE_ID.to_string(),
            api_key: API_KEY.to_string(),
            api_secret: API_SECRET.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Score {
    pub id: Uuid,
    pub player: String,
    pub points: i64,
}

#[derive(Clone, Debug)]
pub struct AppState {
    credentials: Arc<Credentials>,
    seen: Arc<RwLock<HashSet<String>>>,
    scores: Arc<RwLock<HashMap<Uuid, Score>>>,
}

type Fields = HashMap<String, String>;
type Rejection = (StatusCode, Json<Value>);

pub fn app() -> Router {
    app_with(Credentials::default())
}

pub fn app_with(credentials: Credentials) -> Router {
    let state = AppState {
        credentials: Arc::new(credentials),
        seen: Arc::new(RwLock::new(HashSet::new())),
        scores: Arc::new(RwLock::new(HashMap::new())),
    };
    Router::new()
        .route("/status", get(status))
        .route(
            "/users/{id}",
            get(get_user).put(rename_user).delete(delete_user),
        )
        .route("/scores", get(list_scores).post(create_score))
        .route("/slow", get(slow))
        .route("/empty", get(empty))
        .route("/broken", get(broken))
        .route("/created", get(created))
        .route("/moved", get(moved))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Expected signature for `template` at timestamp `t`.
pub fn expected_signature(credentials: &Credentials, template: &str, t: &str) -> String {
    let raw = format!(
        "{}{}{}{}{}",
        credentials.device_id, credentials.api_key, credentials.api_secret, template, t
    );
    hex::encode(Md5::digest(raw.as_bytes()))
}

fn reject(message: &str) -> Rejection {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message })))
}

async fn verify(state: &AppState, template: &str, fields: &Fields) -> Result<(), Rejection> {
    let (Some(signature), Some(t)) = (fields.get("signature"), fields.get("t")) else {
        return Err(reject("missing signature"));
    };
    if *signature != expected_signature(&state.credentials, template, t) {
        tracing::warn!(template, "bad signature");
        return Err(reject("bad signature"));
    }
    if !state.seen.write().await.insert(t.clone()) {
        return Err(reject("replayed timestamp"));
    }
    Ok(())
}

async fn status() -> ([(&'static str, &'static str); 1], Json<Value>) {
    ([("x-mock-server", "sleepy")], Json(json!({ "ok": true })))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(fields): Query<Fields>,
) -> Result<Json<Value>, Rejection> {
    verify(&state, "/users/{id}", &fields).await?;
    Ok(Json(json!({ "id": id, "t": fields.get("t") })))
}

async fn rename_user(Path(id): Path<String>, Form(fields): Form<Fields>) -> Json<Value> {
    Json(json!({ "id": id, "name": fields.get("name") }))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(fields): Query<Fields>,
) -> Result<Json<Value>, Rejection> {
    verify(&state, "/users/{id}", &fields).await?;
    Ok(Json(json!({ "deleted": id })))
}

async fn list_scores(State(state): State<AppState>) -> Json<Value> {
    let scores = state.scores.read().await;
    let all: Vec<&Score> = scores.values().collect();
    Json(json!({ "count": all.len(), "scores": all }))
}

async fn create_score(
    State(state): State<AppState>,
    Form(fields): Form<Fields>,
) -> Result<Json<Score>, Rejection> {
    verify(&state, "/scores", &fields).await?;
    let points = fields
        .get("points")
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "points must be an integer" })),
            )
        })?;
    let score = Score {
        id: Uuid::new_v4(),
        player: fields.get("player").cloned().unwrap_or_default(),
        points,
    };
    state.scores.write().await.insert(score.id, score.clone());
    Ok(Json(score))
}

async fn slow(Query(fields): Query<Fields>) -> Json<Value> {
    let delay = fields
        .get("delay_ms")
        .and_then(|d| d.parse().ok())
        .unwrap_or(0);
    tokio::time::sleep(Duration::from_millis(delay)).await;
    Json(json!({ "tag": fields.get("tag"), "delay_ms": delay }))
}

async fn empty() -> Json<Value> {
    Json(json!({}))
}

async fn broken() -> &'static str {
    "not json"
}

async fn created() -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": 1 })))
}

async fn moved() -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    (StatusCode::FOUND, [(header::LOCATION, "/status")], "moved")
}
