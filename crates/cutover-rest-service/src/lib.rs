//! REST boundary for the cutover control plane.
//!
//! A thin layer: handlers validate against the contract and delegate
//! to the job service and the orchestrator. Service errors map onto
//! HTTP codes here and nowhere else.

pub mod error;
pub mod handlers;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use cutover_core::{JobService, RunOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobService,
    pub orchestrator: RunOrchestrator,
}

/// Build the application router. `cors_origin` restricts CORS when
/// set; the default is permissive, which suits development.
pub fn router(state: AppState, cors_origin: Option<&str>) -> Router {
    let cors = match cors_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!(origin, "unparseable CORS origin, falling back to permissive");
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/jobs", post(handlers::create_job).get(handlers::list_jobs))
        .route("/api/jobs/migrate", post(handlers::migrate_legacy))
        .route(
            "/api/jobs/{id}",
            put(handlers::update_job)
                .get(handlers::get_job)
                .delete(handlers::delete_job),
        )
        .route("/api/jobs/{id}/run", post(handlers::enqueue_run))
        .route("/api/jobs/{id}/runs", get(handlers::runs_for_job))
        .route("/api/runs", get(handlers::list_runs))
        .route("/api/runs/{id}", get(handlers::get_run))
        .route("/api/runs/{id}/artifacts", get(handlers::run_artifacts))
        .route("/api/runs/{id}/cancel", post(handlers::cancel_run))
        .fallback(handlers::not_found)
        .layer(cors)
        .with_state(state)
}
