//! Append-only ledger of receipt events
//!
//! Every intake appends a new row, even for serials seen before. There is no
//! update path; "current" always means the highest receipt id for a serial.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::{prelude::*, receipt_events};
use crate::error::{AppError, AppResult};
use crate::services::asset_registry::AssetDetails;

/// Append a receipt event carrying a snapshot of the asset details.
pub async fn append<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
    package_id: i32,
    snapshot: &AssetDetails,
) -> AppResult<i32> {
    let event = receipt_events::ActiveModel {
        serial_number: Set(serial.to_string()),
        package_id: Set(package_id),
        imei: Set(snapshot.imei.clone()),
        category: Set(snapshot.category.clone()),
        make: Set(snapshot.make.clone()),
        model_number: Set(snapshot.model_number.clone()),
        description: Set(snapshot.description.clone()),
        received_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    if event.receipt_id <= 0 {
        return Err(AppError::Infrastructure(sea_orm::DbErr::RecordNotInserted));
    }

    tracing::debug!(
        serial = %serial,
        receipt_id = event.receipt_id,
        package_id = package_id,
        "Appended receipt event"
    );
    Ok(event.receipt_id)
}

pub async fn find_latest_receipt_id<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
) -> AppResult<Option<i32>> {
    let latest = ReceiptEvents::find()
        .filter(receipt_events::Column::SerialNumber.eq(serial))
        .order_by_desc(receipt_events::Column::ReceiptId)
        .one(conn)
        .await?;

    Ok(latest.map(|r| r.receipt_id))
}

/// Latest receipt id for each serial that has one. Missing serials are absent
/// from the map.
pub async fn find_latest_receipt_ids<C: ConnectionTrait>(
    conn: &C,
    serials: &[String],
) -> AppResult<HashMap<String, i32>> {
    if serials.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(String, i32)> = ReceiptEvents::find()
        .select_only()
        .column(receipt_events::Column::SerialNumber)
        .column_as(Expr::col(receipt_events::Column::ReceiptId).max(), "max_receipt_id")
        .filter(receipt_events::Column::SerialNumber.is_in(serials.iter().cloned()))
        .group_by(receipt_events::Column::SerialNumber)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows.into_iter().collect())
}

/// Every receipt for a serial, newest first.
pub async fn history<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
) -> AppResult<Vec<receipt_events::Model>> {
    Ok(ReceiptEvents::find()
        .filter(receipt_events::Column::SerialNumber.eq(serial))
        .order_by_desc(receipt_events::Column::ReceiptId)
        .all(conn)
        .await?)
}
