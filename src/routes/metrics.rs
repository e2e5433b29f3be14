use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus scrape endpoint, text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the job metrics emitted by the executor.
pub fn describe() {
    ::metrics::describe_counter!(
        "gait_jobs_submitted_total",
        "Total analysis jobs submitted"
    );
    ::metrics::describe_counter!(
        "gait_jobs_completed_total",
        "Total analysis jobs completed"
    );
    ::metrics::describe_counter!(
        "gait_jobs_failed_total",
        "Total analysis jobs that failed"
    );
    ::metrics::describe_counter!(
        "gait_persistence_failures_total",
        "Completed analyses whose archival failed"
    );
    ::metrics::describe_histogram!(
        "gait_job_processing_seconds",
        "Time from job start to terminal state"
    );
    ::metrics::describe_gauge!("gait_jobs_in_flight", "Jobs currently being processed");
}
