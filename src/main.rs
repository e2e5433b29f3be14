use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gait_analysis::app_state::AppState;
use gait_analysis::config::AppConfig;
use gait_analysis::db;
use gait_analysis::routes;
use gait_analysis::services::{
    archive::R2Archive,
    executor::JobExecutor,
    kinematics::KinematicsConfig,
    pose::HttpPoseSource,
    registry::JobRegistry,
    storage::R2Client,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing gait-analysis server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Initializing R2 storage client");
    let r2_client = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
        &config.r2_public_base_url,
    )
    .expect("Failed to initialize R2 client");

    tracing::info!(model_url = %config.pose_model_url, "Using pose model sidecar");
    let poses = HttpPoseSource::new(
        &config.pose_model_url,
        &config.ffprobe_bin,
        config.keypoint_confidence_threshold,
    );

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");

    let executor = JobExecutor::new(
        Arc::new(JobRegistry::new()),
        Arc::new(poses),
        Arc::new(R2Archive::new(db_pool, r2_client)),
        KinematicsConfig::default(),
    );
    let state = AppState::new(executor, &config.upload_dir);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes));

    tracing::info!("Starting gait-analysis on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
