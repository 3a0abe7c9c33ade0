use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::query;
use crate::domains::distribution::Destination;
use crate::domains::job_posts::JobRecord;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    destination: Option<String>,
}

#[derive(Serialize)]
pub struct MessagePreview {
    destination: Destination,
    text: String,
    media_url: Option<String>,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    job_id: String,
    previews: Vec<MessagePreview>,
}

/// Render messages without sending. All destinations when none is given.
pub async fn preview_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<String>,
    params: Result<Query<PreviewParams>, QueryRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let destinations = match query(params)?.destination {
        Some(name) => vec![name
            .parse::<Destination>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?],
        None => Destination::ALL.to_vec(),
    };

    let deps = state.deps();
    let row = deps
        .source
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", job_id)))?;
    let job = JobRecord::try_from(row).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let previews = destinations
        .into_iter()
        .map(|destination| MessagePreview {
            destination,
            text: deps.formatter.format(&job, destination),
            media_url: deps.formatter.media_url(&job),
        })
        .collect();

    Ok(Json(PreviewResponse { job_id, previews }))
}
