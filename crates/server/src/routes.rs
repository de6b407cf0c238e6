use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use askbridge_core::domain::intent::{Intent, IntentId};
use askbridge_core::domain::relay::RelayStatus;
use askbridge_db::repositories::RelayConfigRepository;
use askbridge_engine::{
    EngineError, IntentLifecycle, PendingIntent, PollingGateway, SubmitRequest,
};
use askbridge_relay::RelaySupervisor;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PollingGateway>,
    pub lifecycle: Arc<IntentLifecycle>,
    pub supervisor: Arc<RelaySupervisor>,
    pub relay_config: Arc<dyn RelayConfigRepository>,
    /// Process-level producer credential used when a create request carries
    /// no bearer of its own.
    pub producer_api_key: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/intents", post(create_intent))
        .route("/api/intents/{id}", delete(dismiss_intent))
        .route("/api/poll", get(poll))
        .route("/api/reply", post(reply))
        .route("/api/history", get(history))
        .route("/api/history/delete", post(delete_history))
        .route("/api/relay/status", get(relay_status))
        .route("/api/relay/restart", post(relay_restart))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(error: EngineError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &error {
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::Auth => StatusCode::UNAUTHORIZED,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(error = %error, "request failed against the store");
    }
    (status, Json(ErrorBody { error: error.to_string() }))
}

/// `Authorization: Bearer uk_...` → credential; anything else is anonymous.
fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct CreateIntentBody {
    pub question: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateIntentResponse {
    pub intent_id: IntentId,
    pub answer: Option<String>,
    pub answer_image: Option<String>,
    pub timed_out: bool,
}

pub async fn create_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateIntentBody>,
) -> Result<Json<CreateIntentResponse>, (StatusCode, Json<ErrorBody>)> {
    let credential = bearer_credential(&headers).or_else(|| state.producer_api_key.clone());

    let outcome = state
        .lifecycle
        .submit(SubmitRequest { question: body.question, image: body.image, credential })
        .await
        .map_err(error_response)?;

    Ok(Json(CreateIntentResponse {
        intent_id: outcome.intent_id,
        answer: outcome.answer,
        answer_image: outcome.answer_image,
        timed_out: outcome.timed_out,
    }))
}

pub async fn poll(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PendingIntent>>, (StatusCode, Json<ErrorBody>)> {
    let credential = bearer_credential(&headers);
    let pending =
        state.gateway.poll(credential.as_deref()).await.map_err(error_response)?;
    Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub intent_id: String,
    pub answer: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
}

pub async fn reply(
    State(state): State<AppState>,
    Json(body): Json<ReplyBody>,
) -> Result<Json<StatusBody>, (StatusCode, Json<ErrorBody>)> {
    state
        .gateway
        .reply(&IntentId(body.intent_id), &body.answer, body.image.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(StatusBody { status: "ok" }))
}

pub async fn dismiss_intent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusBody>, (StatusCode, Json<ErrorBody>)> {
    state.gateway.dismiss(&IntentId(id)).await.map_err(error_response)?;
    Ok(Json(StatusBody { status: "dismissed" }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

fn default_history_limit() -> u32 {
    50
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Intent>>, (StatusCode, Json<ErrorBody>)> {
    let credential = bearer_credential(&headers);
    let terminal = state
        .gateway
        .history(credential.as_deref(), params.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(terminal))
}

#[derive(Debug, Deserialize)]
pub struct DeleteHistoryBody {
    pub intent_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteHistoryResponse {
    pub removed: u64,
}

pub async fn delete_history(
    State(state): State<AppState>,
    Json(body): Json<DeleteHistoryBody>,
) -> Result<Json<DeleteHistoryResponse>, (StatusCode, Json<ErrorBody>)> {
    let ids: Vec<IntentId> = body.intent_ids.into_iter().map(IntentId).collect();
    let removed = state.gateway.delete_history(&ids).await.map_err(error_response)?;
    Ok(Json(DeleteHistoryResponse { removed }))
}

pub async fn relay_status(State(state): State<AppState>) -> Json<RelayStatus> {
    Json(state.supervisor.status().await)
}

pub async fn relay_restart(
    State(state): State<AppState>,
) -> Result<Json<StatusBody>, (StatusCode, Json<ErrorBody>)> {
    let profile = state.relay_config.load().await.map_err(|error| {
        error_response(EngineError::Store(error))
    })?;

    let Some(profile) = profile else {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorBody { error: "relay credentials are not configured".to_owned() }),
        ));
    };

    state.supervisor.restart(profile).await;
    Ok(Json(StatusBody { status: "accepted" }))
}
