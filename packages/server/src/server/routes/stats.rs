use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domains::distribution::models::DestinationStats;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Serialize)]
pub struct StatsResponse {
    total_delivered: i64,
    total_failed: i64,
    destinations: Vec<DestinationStats>,
    total_runs: u64,
    failed_runs: u64,
    skipped_ticks: u64,
    high_water_mark: Option<DateTime<Utc>>,
}

/// Aggregate ledger counters plus scheduler run counts.
pub async fn stats(Extension(state): Extension<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let destinations = state.deps().ledger.stats().await?;
    let status = state.coordinator.status().await;

    Ok(Json(StatsResponse {
        total_delivered: destinations.iter().map(|d| d.delivered).sum(),
        total_failed: destinations.iter().map(|d| d.failed).sum(),
        destinations,
        total_runs: status.total_runs,
        failed_runs: status.failed_runs,
        skipped_ticks: status.skipped_ticks,
        high_water_mark: status.high_water_mark,
    }))
}
