use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::application::{SnapshotStore, TargetStore};
use crate::infrastructure::scheduler::JobScheduler;

/// Operational surface for the external admin UI and operators: manual
/// triggers, resync hooks, and read-only visibility. Target CRUD itself
/// happens outside this process, directly against the store.
#[derive(Clone)]
pub struct ApiState {
    pub targets: Arc<dyn TargetStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub scheduler: Arc<JobScheduler>,
    pub api_token: Option<String>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/targets", get(list_targets))
        .route("/jobs", get(list_jobs))
        .route("/targets/{id}/run", post(run_target))
        .route("/targets/{id}/snapshot", delete(delete_snapshot))
        .route("/resync", post(resync))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_targets(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    match state.targets.list_active_targets().await {
        Ok(v) => Json(v).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

#[derive(Serialize)]
struct JobView {
    target_id: String,
    trigger: String,
}

async fn list_jobs(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    let jobs: Vec<JobView> = state
        .scheduler
        .job_descriptions()
        .await
        .into_iter()
        .map(|(target_id, trigger)| JobView { target_id, trigger })
        .collect();
    Json(jobs).into_response()
}

/// Manual "check now". The run is dispatched onto the scheduler's runner
/// and follows the identical executor contract, gate included.
async fn run_target(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    match state.targets.get_target(&id).await {
        Ok(Some(_)) => {
            state.scheduler.run_now(&id);
            (StatusCode::ACCEPTED, "check scheduled".to_string()).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, format!("no target {id}")).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

/// Deletion hook for the admin UI: a removed target's snapshot goes away
/// here, its job goes away on the next resync.
async fn delete_snapshot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    match state.snapshots.remove(&id).await {
        Ok(()) => (StatusCode::NO_CONTENT, String::new()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

/// Called by the admin UI after any create/update/delete/toggle.
async fn resync(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    match state.scheduler.resync().await {
        Ok(()) => (StatusCode::OK, "resynced".to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

fn check_auth(headers: &HeaderMap, token: &Option<String>) -> Result<(), (StatusCode, String)> {
    let Some(expected) = token else {
        return Ok(());
    }; // 未设置 token, 则不鉴权（可选策略）
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if auth == format!("Bearer {}", expected) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "unauthorized".to_string()))
    }
}
