//! Application setup and router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::domains::distribution::CycleCoordinator;
use crate::kernel::RelayDeps;
use crate::server::routes::{
    deliveries, health, jobs, preview, scheduler, service_info, stats,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CycleCoordinator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(coordinator: Arc<CycleCoordinator>) -> Self {
        Self {
            coordinator,
            started_at: Utc::now(),
        }
    }

    pub fn deps(&self) -> &RelayDeps {
        self.coordinator.runner().deps()
    }
}

/// Manual triggers run a whole cycle inline, so the budget is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - read-mostly operator API
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health::health_handler))
        .route("/api/candidates", get(jobs::list_candidates))
        .route("/api/jobs/:job_id", get(jobs::get_job))
        .route("/api/jobs/:job_id/publish", post(jobs::publish_job))
        .route("/api/scheduler/trigger", post(scheduler::trigger_cycle))
        .route("/api/scheduler/status", get(scheduler::scheduler_status))
        .route("/api/deliveries/recent", get(deliveries::recent_deliveries))
        .route("/api/stats", get(stats::stats))
        .route("/api/preview/:job_id", get(preview::preview_job))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
