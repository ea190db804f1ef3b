use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppError;
use crate::models::flags::FlagRequest;
use crate::services::flags::{self, FlagRecord};
use crate::AppState;

/// GET /api/flags
pub async fn list_flags(State(state): State<AppState>) -> Result<Json<Vec<FlagRecord>>, AppError> {
    Ok(Json(flags::list(&state.db).await?))
}

/// POST /api/flags
///
/// ```json
/// { "serialNumber": "5CG1234XYZ", "reason": "[NOREMOVE] Reported stolen" }
/// ```
pub async fn flag_device(
    State(state): State<AppState>,
    Json(request): Json<FlagRequest>,
) -> Result<Json<FlagRecord>, AppError> {
    let record = flags::flag(&state.db, &request.serial_number, request.reason.as_deref()).await?;
    Ok(Json(record))
}

/// DELETE /api/flags/{serial}
pub async fn unflag_device(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<StatusCode, AppError> {
    if flags::unflag(&state.db, &serial).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Serial {} is not flagged", serial)))
    }
}
