use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppError;
use crate::models::mel_rules::{MelLookupQuery, MelLookupResponse};
use crate::services::disposition_rules;
use crate::AppState;

/// GET /api/mel-rules/lookup?model=5400&description=Latitude%205400
///
/// `rule` is null when nothing matches.
///
/// ```json
/// {
///   "rule": { "id": 3, "modelNumber": "5400", "description": null, "action": "Dispose", "specialNotes": "EOL", "manufacturer": "Dell" },
///   "matchedOn": "model_number",
///   "suggestedDisposition": { "status": "Disposed", "subStatus": "Ready for Wipe", "reason": "EOL", "boxId": null }
/// }
/// ```
pub async fn lookup_mel_rule(
    State(state): State<AppState>,
    Query(query): Query<MelLookupQuery>,
) -> Result<Json<MelLookupResponse>, AppError> {
    let found = disposition_rules::find_mel_rule(
        &state.db,
        query.model.as_deref(),
        query.description.as_deref(),
    )
    .await?;
    Ok(Json(found.into()))
}
