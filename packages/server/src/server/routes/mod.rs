// HTTP routes
pub mod deliveries;
pub mod health;
pub mod jobs;
pub mod preview;
pub mod scheduler;
pub mod stats;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domains::distribution::Destination;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Serialize)]
pub struct ServiceInfo {
    service: &'static str,
    version: &'static str,
    started_at: DateTime<Utc>,
    destinations: Vec<Destination>,
    endpoints: Vec<&'static str>,
}

pub async fn service_info(Extension(state): Extension<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "job-relay",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        destinations: state.deps().destinations(),
        endpoints: vec![
            "GET /health",
            "GET /api/candidates?hours=24",
            "GET /api/jobs/:job_id",
            "POST /api/jobs/:job_id/publish",
            "POST /api/scheduler/trigger",
            "GET /api/scheduler/status",
            "GET /api/deliveries/recent?hours=24&limit=50",
            "GET /api/stats",
            "GET /api/preview/:job_id?destination=telegram",
        ],
    })
}

/// Unwrap a query extractor, reporting malformed parameters in the JSON error shape.
pub(crate) fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// `hours` window for list endpoints, 1 hour to 30 days.
pub(crate) fn window_hours(hours: Option<i64>) -> Result<i64, ApiError> {
    let hours = hours.unwrap_or(24);
    if !(1..=720).contains(&hours) {
        return Err(ApiError::BadRequest(format!(
            "hours must be between 1 and 720, got {}",
            hours
        )));
    }
    Ok(hours)
}
