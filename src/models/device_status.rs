use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::services::status_store::{AtomicityMode, SortBy, StatusChange, StatusFilters};

/// Query string of `GET /api/device-status`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusQuery {
    pub serial: Option<String>,
    pub status: Option<String>,
    pub sub_status: Option<String>,
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub sort_by: Option<SortBy>,
    /// Zero-based
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl DeviceStatusQuery {
    pub fn filters(&self) -> StatusFilters {
        StatusFilters {
            serial: self.serial.clone(),
            status: self.status.clone(),
            sub_status: self.sub_status.clone(),
            category: self.category.clone(),
            from_date: self.from_date,
            to_date: self.to_date,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub receipt_ids: Vec<i32>,
    pub status: String,
    pub sub_status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub box_id: Option<String>,
    /// Receipt id to the version the caller last saw
    #[serde(default)]
    pub expected_versions: Option<HashMap<i32, i32>>,
}

impl UpdateStatusRequest {
    pub fn change(&self) -> StatusChange {
        StatusChange {
            status: self.status.clone(),
            sub_status: self.sub_status.clone(),
            note: self.note.clone(),
            box_id: self.box_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub updated_receipt_ids: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub serials: Vec<String>,
    pub status: String,
    pub sub_status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub box_id: Option<String>,
    #[serde(default)]
    pub mode: AtomicityMode,
}

impl BulkUpdateRequest {
    pub fn change(&self) -> StatusChange {
        StatusChange {
            status: self.status.clone(),
            sub_status: self.sub_status.clone(),
            note: self.note.clone(),
            box_id: self.box_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMoveRequest {
    pub source_box_id: String,
    pub destination_box_id: String,
    pub serials: Vec<String>,
    #[serde(default)]
    pub mode: AtomicityMode,
}
