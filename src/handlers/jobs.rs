//! Job status and cancellation
//!
//! GET /api/jobs/{id}, POST /api/jobs/{id}/cancel

use std::future::Future;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::jobs::{JobInfo, JobQueue};
use crate::AppState;

/// Run a mutation through the job queue.
///
/// Detached requests get `202 Accepted` with the queued job; everything else
/// waits for the result.
pub(crate) async fn dispatch<T, F, Fut>(
    jobs: &JobQueue,
    kind: &str,
    detach: bool,
    task: F,
) -> Result<Response, AppError>
where
    T: Serialize + Send + 'static,
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    if detach {
        let (info, _) = jobs.submit(kind, task).await?;
        return Ok((StatusCode::ACCEPTED, Json(info)).into_response());
    }
    let result = jobs.run(kind, task).await?;
    Ok(Json(result).into_response())
}

/// GET /api/jobs/{id}
///
/// ```json
/// {
///   "id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
///   "kind": "intake_serials",
///   "status": "completed",
///   "submittedAt": "2026-10-01T14:03:11Z",
///   "finishedAt": "2026-10-01T14:03:12Z",
///   "error": null,
///   "result": { "successCount": 12, "duplicateCount": 0, "newAssetCount": 3, "returnCount": 9, "receiptIds": [] }
/// }
/// ```
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobInfo>, AppError> {
    state
        .jobs
        .status(id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Job {} not found", id)))
}

/// POST /api/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobInfo>, AppError> {
    Ok(Json(state.jobs.cancel(id)?))
}
