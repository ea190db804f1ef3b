//! Device status table and status mutations

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use tracing::info;

use crate::error::AppError;
use crate::handlers::jobs::dispatch;
use crate::models::common::DetachQuery;
use crate::models::device_status::{
    BulkMoveRequest, BulkUpdateRequest, DeviceStatusQuery, UpdateStatusRequest,
    UpdateStatusResponse,
};
use crate::services::status_store::{
    self, DeviceHistoryEntry, DeviceStatusView, Page, PageRequest, StatusLifecycleStore,
};
use crate::AppState;

/// GET /api/device-status
///
/// # Query Parameters
///
/// - `serial` - substring match on serial number
/// - `status`, `subStatus`, `category` - exact matches
/// - `fromDate`, `toDate` - inclusive `YYYY-MM-DD` range on last update
/// - `sortBy` - `status` or `category`; ties and the default order are newest first
/// - `page` - zero-based page index (default 0)
/// - `pageSize` - rows per page (default 200)
///
/// # Response
///
/// ```json
/// {
///   "items": [
///     {
///       "receiptId": 42,
///       "serialNumber": "5CG1234XYZ",
///       "category": "Laptop",
///       "make": "HP",
///       "description": "EliteBook 840 G8",
///       "status": "Intake",
///       "subStatus": "In Evaluation",
///       "lastUpdate": "2026-10-01T14:03:11",
///       "note": null,
///       "boxId": null,
///       "version": 1,
///       "isFlagged": false
///     }
///   ],
///   "total": 1,
///   "page": 0,
///   "pageSize": 200
/// }
/// ```
pub async fn list_device_status(
    State(state): State<AppState>,
    Query(query): Query<DeviceStatusQuery>,
) -> Result<Json<Page<DeviceStatusView>>, AppError> {
    let page = PageRequest {
        page: query.page.unwrap_or(0),
        page_size: query
            .page_size
            .unwrap_or(state.config.default_page_size)
            .min(state.config.max_page_size),
    };

    let store = StatusLifecycleStore::new(&state.db, &state.taxonomy);
    let result = store
        .query(&query.filters(), query.sort_by.unwrap_or_default(), page)
        .await?;
    Ok(Json(result))
}

/// GET /api/device-status/{serial}/history
pub async fn get_device_history(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<Vec<DeviceHistoryEntry>>, AppError> {
    let store = StatusLifecycleStore::new(&state.db, &state.taxonomy);
    let history = store.history(&serial).await?;
    if history.is_empty() {
        return Err(AppError::not_found(format!("No receipts for serial {}", serial)));
    }
    Ok(Json(history))
}

/// Update specific receipts, all or nothing
///
/// POST /api/device-status/update
///
/// ```json
/// {
///   "receiptIds": [41, 42],
///   "status": "Disposed",
///   "subStatus": "Ingram, Pending Pickup",
///   "note": "Failed diagnostics",
///   "boxId": "BOX7",
///   "expectedVersions": { "41": 1, "42": 3 }
/// }
/// ```
pub async fn update_status(
    State(state): State<AppState>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Response, AppError> {
    info!(
        receipts = request.receipt_ids.len(),
        status = %request.status,
        sub_status = %request.sub_status,
        "Status update request received"
    );

    status_store::require_receipt_ids(&request.receipt_ids)?;
    request.change().validate(&state.taxonomy)?;

    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "update_status", query.detach, move |_| async move {
        let updated = StatusLifecycleStore::new(&db, &taxonomy)
            .update_status(
                &request.receipt_ids,
                &request.change(),
                request.expected_versions.as_ref(),
            )
            .await?;
        Ok(UpdateStatusResponse {
            updated_receipt_ids: updated,
        })
    })
    .await
}

/// Update the current receipt of each serial
///
/// POST /api/device-status/bulk-update
///
/// ```json
/// {
///   "serials": ["ABC123", "NOTEXIST"],
///   "status": "Processed",
///   "subStatus": "Ready for Deployment",
///   "mode": "partial_success"
/// }
/// ```
///
/// # Response
///
/// ```json
/// { "updated": ["ABC123"], "notFound": ["NOTEXIST"] }
/// ```
pub async fn bulk_update(
    State(state): State<AppState>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<BulkUpdateRequest>,
) -> Result<Response, AppError> {
    info!(
        serials = request.serials.len(),
        status = %request.status,
        mode = ?request.mode,
        "Bulk status update request received"
    );

    status_store::require_serials(&request.serials)?;
    request.change().validate(&state.taxonomy)?;

    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "bulk_update", query.detach, move |_| async move {
        StatusLifecycleStore::new(&db, &taxonomy)
            .bulk_update_by_serial(&request.serials, &request.change(), request.mode)
            .await
    })
    .await
}

/// Move devices between boxes
///
/// POST /api/device-status/bulk-move
///
/// ```json
/// { "sourceBoxId": "BOX1", "destinationBoxId": "BOX2", "serials": ["S1", "S2"] }
/// ```
///
/// # Response
///
/// ```json
/// { "moved": ["S1"], "notFoundOrFailed": ["S2"] }
/// ```
pub async fn bulk_move(
    State(state): State<AppState>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<BulkMoveRequest>,
) -> Result<Response, AppError> {
    info!(
        source = %request.source_box_id,
        destination = %request.destination_box_id,
        serials = request.serials.len(),
        "Bulk move request received"
    );

    status_store::move_endpoints(&request.source_box_id, &request.destination_box_id)?;
    status_store::require_serials(&request.serials)?;

    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "bulk_move", query.detach, move |_| async move {
        StatusLifecycleStore::new(&db, &taxonomy)
            .bulk_move(
                &request.source_box_id,
                &request.destination_box_id,
                &request.serials,
                request.mode,
            )
            .await
    })
    .await
}
