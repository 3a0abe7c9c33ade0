use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{query, window_hours};
use crate::domains::distribution::models::DeliveryRecord;
use crate::domains::distribution::{Destination, JobOutcome};
use crate::domains::job_posts::{JobPostRow, JobRecord};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CandidateParams {
    hours: Option<i64>,
}

#[derive(Serialize)]
pub struct Candidate {
    job: JobRecord,
    /// Configured destinations with no successful delivery yet
    pending_destinations: Vec<Destination>,
}

#[derive(Serialize)]
pub struct InvalidCandidate {
    job_id: String,
    error: String,
}

#[derive(Serialize)]
pub struct CandidatesResponse {
    hours: i64,
    count: usize,
    candidates: Vec<Candidate>,
    invalid: Vec<InvalidCandidate>,
}

/// Published jobs in the window that at least one destination has not received.
pub async fn list_candidates(
    Extension(state): Extension<AppState>,
    params: Result<Query<CandidateParams>, QueryRejection>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let hours = window_hours(query(params)?.hours)?;
    let deps = state.deps();
    let since = Utc::now() - chrono::Duration::hours(hours);

    let rows = deps.source.fetch_candidates(since).await?;
    let destinations = deps.destinations();

    let mut candidates = Vec::new();
    let mut invalid = Vec::new();
    for row in rows {
        let job_id = row.id.clone();
        let job = match JobRecord::try_from(row) {
            Ok(job) => job,
            Err(e) => {
                invalid.push(InvalidCandidate {
                    job_id,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let mut pending_destinations = Vec::new();
        for destination in &destinations {
            if !deps.ledger.has_been_delivered(&job.id, *destination).await? {
                pending_destinations.push(*destination);
            }
        }
        if !pending_destinations.is_empty() {
            candidates.push(Candidate {
                job,
                pending_destinations,
            });
        }
    }

    Ok(Json(CandidatesResponse {
        hours,
        count: candidates.len(),
        candidates,
        invalid,
    }))
}

#[derive(Serialize)]
pub struct JobDetail {
    job: JobPostRow,
    validation_error: Option<String>,
    deliveries: Vec<DeliveryRecord>,
}

pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobDetail>, ApiError> {
    let deps = state.deps();
    let row = deps
        .source
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", job_id)))?;

    let validation_error = JobRecord::try_from(row.clone()).err().map(|e| e.to_string());
    let deliveries = deps.ledger.deliveries_for_job(&job_id).await?;

    Ok(Json(JobDetail {
        job: row,
        validation_error,
        deliveries,
    }))
}

/// Publish one job now to every destination that has not received it.
pub async fn publish_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobOutcome>, ApiError> {
    let outcome = state.coordinator.publish_job(&job_id).await?;
    Ok(Json(outcome))
}
