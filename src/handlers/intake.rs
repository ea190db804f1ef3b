//! Intake endpoints
//!
//! Both endpoints run as a queued job. Add `?detach=true` to get the job back
//! immediately and poll `/api/jobs/{id}` for the batch result. Malformed
//! requests are rejected before anything is queued.

use axum::{
    extract::{Query, State},
    response::Response,
    Json,
};
use tracing::info;

use crate::error::AppError;
use crate::handlers::jobs::dispatch;
use crate::models::common::DetachQuery;
use crate::models::intake::{RowIntakeRequest, SerialIntakeRequest};
use crate::services::intake::{self, IntakeOrchestrator};
use crate::services::packages;
use crate::AppState;

/// Receive a list of serials sharing one set of asset details
///
/// POST /api/intake/serials
///
/// # Request Body
///
/// ```json
/// {
///   "packageId": 7,
///   "serials": ["5CG1234XYZ", "5CG1234XZA"],
///   "details": { "make": "HP", "modelNumber": "840 G8", "category": "Laptop" },
///   "isNewCondition": false,
///   "scrap": { "status": "Disposed", "subStatus": "Can-Am, Pending Pickup", "reason": "Cracked", "boxId": "BOX1" }
/// }
/// ```
///
/// # Response
///
/// ```json
/// { "successCount": 2, "duplicateCount": 0, "newAssetCount": 2, "returnCount": 0, "receiptIds": [41, 42] }
/// ```
pub async fn intake_serials(
    State(state): State<AppState>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<SerialIntakeRequest>,
) -> Result<Response, AppError> {
    info!(
        package_id = request.package_id,
        serials = request.serials.len(),
        detach = query.detach,
        "Serial intake request received"
    );

    intake::require_serials(request.serials.iter().map(String::as_str))?;
    request.flags().validate(&state.taxonomy)?;
    packages::find(&state.db, request.package_id).await?;

    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "intake_serials", query.detach, move |cancel| async move {
        let flags = request.flags();
        IntakeOrchestrator::new(&db, &taxonomy)
            .process_serial_list(
                request.package_id,
                &request.serials,
                &request.details,
                &flags,
                &cancel,
            )
            .await
    })
    .await
}

/// Receive table rows, each with its own asset details
///
/// POST /api/intake/rows
///
/// ```json
/// {
///   "packageId": 7,
///   "rows": [
///     { "serialNumber": "R52N80ABCDE", "make": "Samsung", "category": "Phone", "imei": "356789101112131" }
///   ]
/// }
/// ```
pub async fn intake_rows(
    State(state): State<AppState>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<RowIntakeRequest>,
) -> Result<Response, AppError> {
    info!(
        package_id = request.package_id,
        rows = request.rows.len(),
        detach = query.detach,
        "Row intake request received"
    );

    intake::require_serials(request.rows.iter().map(|r| r.serial_number.as_str()))?;
    request.flags().validate(&state.taxonomy)?;
    packages::find(&state.db, request.package_id).await?;

    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "intake_rows", query.detach, move |cancel| async move {
        let flags = request.flags();
        IntakeOrchestrator::new(&db, &taxonomy)
            .process_table_rows(request.package_id, &request.rows, &flags, &cancel)
            .await
    })
    .await
}
