use chrono::NaiveDate;
use serde::Serialize;

use crate::entities::packages;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResponse {
    pub id: i32,
    pub tracking_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub receive_date: NaiveDate,
    /// Current receipts in the package, excluding ones deleted by mistake
    pub asset_count: u64,
}

impl PackageResponse {
    pub fn new(package: packages::Model, asset_count: u64) -> Self {
        Self {
            id: package.id,
            tracking_number: package.tracking_number,
            first_name: package.first_name,
            last_name: package.last_name,
            city: package.city,
            state: package.state,
            zip_code: package.zip_code,
            receive_date: package.receive_date,
            asset_count,
        }
    }
}
