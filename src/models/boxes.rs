use serde::{Deserialize, Serialize};

use crate::services::box_index::BoxContent;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoxListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxContentsResponse {
    pub box_id: String,
    pub items: Vec<BoxContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxStatusRequest {
    pub status: String,
    pub sub_status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxStatusResponse {
    pub box_id: String,
    pub updated: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveFromBoxRequest {
    pub serials: Vec<String>,
}
