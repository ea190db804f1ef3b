use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `?detach=true` returns the queued job instead of waiting for its result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetachQuery {
    #[serde(default)]
    pub detach: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
