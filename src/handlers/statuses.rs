use axum::{extract::State, Json};

use crate::models::common::HealthResponse;
use crate::services::taxonomy::StatusEntry;
use crate::AppState;

/// GET /api/statuses
pub async fn list_statuses(State(state): State<AppState>) -> Json<Vec<StatusEntry>> {
    Json(state.taxonomy.entries().to_vec())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            "unavailable"
        }
    };
    Json(HealthResponse {
        status: "ok",
        database,
    })
}
