//! Packages group the receipt events of one intake session.

use std::collections::HashSet;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};
use serde::Deserialize;

use crate::entities::{device_status, packages, prelude::*, receipt_events};
use crate::error::{AppError, AppResult};
use crate::services::receipt_ledger;
use crate::services::taxonomy::SUB_DELETED_MISTAKE;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPackage {
    pub tracking_number: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub receive_date: NaiveDate,
}

pub async fn create<C: ConnectionTrait>(conn: &C, new: &NewPackage) -> AppResult<packages::Model> {
    let tracking = new.tracking_number.trim();
    if tracking.is_empty() {
        return Err(AppError::validation("Tracking number is required"));
    }

    let existing = Packages::find()
        .filter(packages::Column::TrackingNumber.eq(tracking))
        .one(conn)
        .await?;
    if existing.is_some() {
        return Err(AppError::validation(format!(
            "A package with tracking number '{}' already exists",
            tracking
        )));
    }

    let text = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let package = packages::ActiveModel {
        tracking_number: Set(tracking.to_string()),
        first_name: Set(text(&new.first_name)),
        last_name: Set(text(&new.last_name)),
        city: Set(text(&new.city)),
        state: Set(text(&new.state).map(|s| s.to_uppercase())),
        zip_code: Set(text(&new.zip_code)),
        receive_date: Set(new.receive_date),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    tracing::info!(package_id = package.id, tracking = %package.tracking_number, "Created package");
    Ok(package)
}

pub async fn find<C: ConnectionTrait>(conn: &C, package_id: i32) -> AppResult<packages::Model> {
    Packages::find_by_id(package_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Package {} does not exist", package_id)))
}

/// Devices whose current receipt belongs to the package, excluding entries
/// marked as deleted by mistake.
pub async fn asset_count<C: ConnectionTrait>(conn: &C, package_id: i32) -> AppResult<u64> {
    let receipts: Vec<(i32, String)> = ReceiptEvents::find()
        .select_only()
        .column(receipt_events::Column::ReceiptId)
        .column(receipt_events::Column::SerialNumber)
        .filter(receipt_events::Column::PackageId.eq(package_id))
        .into_tuple()
        .all(conn)
        .await?;

    if receipts.is_empty() {
        return Ok(0);
    }

    let serials: Vec<String> = receipts
        .iter()
        .map(|(_, serial)| serial.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let latest = receipt_ledger::find_latest_receipt_ids(conn, &serials).await?;

    let current: Vec<i32> = receipts
        .into_iter()
        .filter(|(id, serial)| latest.get(serial) == Some(id))
        .map(|(id, _)| id)
        .collect();

    let count = DeviceStatus::find()
        .filter(device_status::Column::ReceiptId.is_in(current))
        .filter(device_status::Column::SubStatus.ne(SUB_DELETED_MISTAKE))
        .count(conn)
        .await?;

    Ok(count)
}
