pub mod health;
pub mod jobs;
pub mod metrics;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// API routes. Middleware and the `/metrics` scrape endpoint are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))
        .route("/api/ready", get(health::readiness))
        .route("/api/wake", post(health::wake).get(health::wake))
        .route("/api/jobs", post(jobs::submit_job))
        .route("/api/jobs/{job_id}", get(jobs::get_job_status))
        .route(
            "/api/subjects/{subject_id}/analyses",
            get(jobs::list_subject_analyses),
        )
        .with_state(state)
}
