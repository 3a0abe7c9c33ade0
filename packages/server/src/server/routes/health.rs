use axum::{extract::Extension, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domains::distribution::Destination;
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    ledger: LedgerHealth,
    destinations: Vec<Destination>,
    scheduler: SchedulerHealth,
}

#[derive(Serialize)]
pub struct LedgerHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct SchedulerHealth {
    running: bool,
    cycle_in_progress: bool,
    last_finished_at: Option<DateTime<Utc>>,
}

/// Health check endpoint
///
/// Checks:
/// - Delivery ledger connectivity and responsiveness
/// - Which destinations have publishers
/// - Scheduler state
///
/// Returns 200 OK when the ledger answers, 503 Service Unavailable otherwise.
/// Without the ledger no job can be published.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let ledger_health = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        state.deps().ledger.ping(),
    )
    .await
    {
        Ok(Ok(())) => LedgerHealth {
            status: "ok".to_string(),
            error: None,
        },
        Ok(Err(e)) => LedgerHealth {
            status: "error".to_string(),
            error: Some(format!("Query failed: {}", e)),
        },
        Err(_) => LedgerHealth {
            status: "error".to_string(),
            error: Some("Query timeout (>5s)".to_string()),
        },
    };

    let scheduler = state.coordinator.status().await;
    let is_healthy = ledger_health.status == "ok";

    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
            ledger: ledger_health,
            destinations: state.deps().destinations(),
            scheduler: SchedulerHealth {
                running: scheduler.scheduler_running,
                cycle_in_progress: scheduler.cycle_in_progress,
                last_finished_at: scheduler.last_finished_at,
            },
        }),
    )
}
