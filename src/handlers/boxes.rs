//! Box viewer endpoints

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};

use crate::error::AppError;
use crate::handlers::jobs::dispatch;
use crate::models::boxes::{
    BoxContentsResponse, BoxListQuery, BoxStatusRequest, BoxStatusResponse, RemoveFromBoxRequest,
};
use crate::models::common::DetachQuery;
use crate::services::box_index::{BoxLocationIndex, BoxSummary};
use crate::services::disposition_rules::normalize_box_id;
use crate::AppState;

/// GET /api/boxes?search=box
///
/// ```json
/// [ { "boxId": "BOX1", "itemCount": 14 }, { "boxId": "BOX2", "itemCount": 3 } ]
/// ```
pub async fn list_boxes(
    State(state): State<AppState>,
    Query(query): Query<BoxListQuery>,
) -> Result<Json<Vec<BoxSummary>>, AppError> {
    let index = BoxLocationIndex::new(&state.db, &state.taxonomy);
    Ok(Json(index.summaries(query.search.as_deref()).await?))
}

/// GET /api/boxes/{boxId}
pub async fn get_box(
    State(state): State<AppState>,
    Path(box_id): Path<String>,
) -> Result<Json<BoxContentsResponse>, AppError> {
    let index = BoxLocationIndex::new(&state.db, &state.taxonomy);
    let items = index.contents(&box_id).await?;
    Ok(Json(BoxContentsResponse {
        box_id: normalize_box_id(Some(box_id.as_str())).unwrap_or(box_id),
        items,
    }))
}

/// POST /api/boxes/{boxId}/status
///
/// ```json
/// { "status": "Disposed", "subStatus": "Ingram, Pending Pickup" }
/// ```
pub async fn update_box_status(
    State(state): State<AppState>,
    Path(box_id): Path<String>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<BoxStatusRequest>,
) -> Result<Response, AppError> {
    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "box_status", query.detach, move |_| async move {
        let updated = BoxLocationIndex::new(&db, &taxonomy)
            .update_box_status(&box_id, &request.status, &request.sub_status)
            .await?;
        Ok(BoxStatusResponse {
            box_id: normalize_box_id(Some(box_id.as_str())).unwrap_or(box_id),
            updated,
        })
    })
    .await
}

/// POST /api/boxes/remove
///
/// ```json
/// { "serials": ["S1", "S2"] }
/// ```
pub async fn remove_from_box(
    State(state): State<AppState>,
    Query(query): Query<DetachQuery>,
    Json(request): Json<RemoveFromBoxRequest>,
) -> Result<Response, AppError> {
    let db = state.db.clone();
    let taxonomy = state.taxonomy.clone();
    dispatch(&state.jobs, "box_remove", query.detach, move |_| async move {
        BoxLocationIndex::new(&db, &taxonomy)
            .remove_from_box(&request.serials)
            .await
    })
    .await
}
