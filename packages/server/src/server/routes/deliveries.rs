use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{query, window_hours};
use crate::domains::distribution::models::DeliveryRecord;
use crate::server::app::AppState;
use crate::server::error::ApiError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    hours: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
pub struct RecentDeliveries {
    hours: i64,
    count: usize,
    deliveries: Vec<DeliveryRecord>,
}

pub async fn recent_deliveries(
    Extension(state): Extension<AppState>,
    params: Result<Query<RecentParams>, QueryRejection>,
) -> Result<Json<RecentDeliveries>, ApiError> {
    let params = query(params)?;
    let hours = window_hours(params.hours)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        )));
    }

    let deliveries = state
        .deps()
        .ledger
        .recently_delivered(chrono::Duration::hours(hours), limit)
        .await?;

    Ok(Json(RecentDeliveries {
        hours,
        count: deliveries.len(),
        deliveries,
    }))
}
