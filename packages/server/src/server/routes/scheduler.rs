use axum::{extract::Extension, Json};

use crate::domains::distribution::{CycleSummary, SchedulerStatus};
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// Run a full cycle now and return its summary. 409 while another run holds the lock.
pub async fn trigger_cycle(
    Extension(state): Extension<AppState>,
) -> Result<Json<CycleSummary>, ApiError> {
    tracing::info!("Manual cycle trigger requested");
    let summary = state.coordinator.trigger().await?;
    Ok(Json(summary))
}

pub async fn scheduler_status(Extension(state): Extension<AppState>) -> Json<SchedulerStatus> {
    Json(state.coordinator.status().await)
}
