//! Request handlers. Thin by design: validate, delegate, map.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use cutover_rest_api_contract::{
    CreateJobRequest, EnqueueRunRequest, ErrorResponse, HealthResponse, MigrateResponse,
    UpdateJobRequest,
};

use crate::error::ApiError;
use crate::AppState;

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.jobs.create(request).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.jobs.list().await)
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.get(&id).await?))
}

pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.update(&id, request).await?))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.jobs.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enqueue_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<EnqueueRunRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let triggered_by = body.and_then(|Json(b)| b.triggered_by);
    let run = state.orchestrator.enqueue(&id, triggered_by).await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

pub async fn runs_for_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.runs_for_job(&id).await?))
}

pub async fn migrate_legacy(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.jobs.migrate_legacy().await?;
    Ok(Json(MigrateResponse { count }))
}

pub async fn list_runs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.jobs.list_runs().await)
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.get_run(&id).await?))
}

pub async fn run_artifacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(state.jobs.artifacts_for_run(&id).await)
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run = state.orchestrator.cancel(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            message: "no such route".to_string(),
        }),
    )
}
