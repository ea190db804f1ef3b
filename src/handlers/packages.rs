use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppError;
use crate::models::packages::PackageResponse;
use crate::services::packages::{self, NewPackage};
use crate::AppState;

/// POST /api/packages
///
/// ```json
/// {
///   "trackingNumber": "1Z999AA10123456784",
///   "firstName": "Dana",
///   "lastName": "Ortiz",
///   "city": "Lansing",
///   "state": "MI",
///   "zipCode": "48933",
///   "receiveDate": "2026-10-01"
/// }
/// ```
pub async fn create_package(
    State(state): State<AppState>,
    Json(request): Json<NewPackage>,
) -> Result<(StatusCode, Json<PackageResponse>), AppError> {
    let package = packages::create(&state.db, &request).await?;
    Ok((StatusCode::CREATED, Json(PackageResponse::new(package, 0))))
}

/// GET /api/packages/{id}
pub async fn get_package(
    State(state): State<AppState>,
    Path(package_id): Path<i32>,
) -> Result<Json<PackageResponse>, AppError> {
    let package = packages::find(&state.db, package_id).await?;
    let count = packages::asset_count(&state.db, package_id).await?;
    Ok(Json(PackageResponse::new(package, count)))
}
