//! Box location index
//!
//! Disposed devices are packed into physical boxes. The box a device sits in
//! lives in `device_status.box_id`; rows written before that column existed
//! only carry it in the note prefix (`Box ID: BOX1. reason`), which
//! [`parse_box_id`] understands.

use chrono::{NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, TransactionTrait,
};
use serde::Serialize;
use tracing::info;

use crate::entities::{device_status, prelude::*};
use crate::error::{AppError, AppResult};
use crate::services::disposition_rules::{box_note, normalize_box_id};
use crate::services::status_store::{self, SqlParams, LATEST_RECEIPTS_SQL};
use crate::services::taxonomy::{StatusTaxonomy, STATUS_DISPOSED, SUB_READY_FOR_WIPE};

pub const REMOVED_FROM_BOX_NOTE: &str = "Removed from box";

lazy_static! {
    static ref BOX_NOTE_PREFIX: Regex = Regex::new(r"^\s*Box ID:\s*([^.]*)").unwrap();
}

/// Box id embedded at the start of a note, upper-cased.
pub fn parse_box_id(note: &str) -> Option<String> {
    BOX_NOTE_PREFIX
        .captures(note)
        .and_then(|c| c.get(1))
        .and_then(|m| normalize_box_id(Some(m.as_str())))
}

/// Box a status row currently sits in: the column, else the legacy note prefix.
pub fn location_of(row: &device_status::Model) -> Option<String> {
    row.box_id
        .clone()
        .or_else(|| row.note.as_deref().and_then(parse_box_id))
}

/// Point a note at a new box, keeping whatever follows the prefix.
pub fn rewrite_box_note(note: Option<&str>, destination: &str) -> String {
    match note {
        Some(note) if BOX_NOTE_PREFIX.is_match(note) => BOX_NOTE_PREFIX
            .replace(note, format!("Box ID: {}", destination).as_str())
            .into_owned(),
        other => box_note(destination, other),
    }
}

/// Drop the box prefix from a note, keeping the reason after it.
pub fn strip_box_note(note: Option<&str>) -> Option<String> {
    let note = note?;
    let rest = match BOX_NOTE_PREFIX.find(note) {
        Some(prefix) => note[prefix.end()..].trim_start_matches('.'),
        None => note,
    };
    Some(rest.trim().to_string()).filter(|r| !r.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct BoxSummary {
    pub box_id: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct BoxContent {
    pub receipt_id: i32,
    pub serial_number: String,
    pub status: String,
    pub sub_status: String,
    pub note: Option<String>,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResult {
    pub removed: Vec<String>,
    pub not_in_box: Vec<String>,
}

pub struct BoxLocationIndex<'a> {
    db: &'a DatabaseConnection,
    taxonomy: &'a StatusTaxonomy,
}

impl<'a> BoxLocationIndex<'a> {
    pub fn new(db: &'a DatabaseConnection, taxonomy: &'a StatusTaxonomy) -> Self {
        Self { db, taxonomy }
    }

    /// Boxes holding at least one device, with item counts, ordered by box id.
    pub async fn summaries(&self, search: Option<&str>) -> AppResult<Vec<BoxSummary>> {
        let mut params = SqlParams::new(self.db.get_database_backend());
        let mut sql = format!(
            "SELECT ds.box_id AS box_id, COUNT(*) AS item_count \
             FROM ({}) re JOIN device_status ds ON ds.receipt_id = re.receipt_id \
             WHERE ds.box_id IS NOT NULL",
            LATEST_RECEIPTS_SQL
        );
        if let Some(search) = normalize_box_id(search) {
            sql.push_str(&format!(
                " AND UPPER(ds.box_id) LIKE {} ESCAPE '\\'",
                params.push(status_store::contains_pattern(&search))
            ));
        }
        sql.push_str(" GROUP BY ds.box_id ORDER BY ds.box_id");

        Ok(BoxSummary::find_by_statement(params.statement(sql))
            .all(self.db)
            .await?)
    }

    pub async fn contents(&self, box_id: &str) -> AppResult<Vec<BoxContent>> {
        contents(self.db, box_id).await
    }

    /// Set every device in a box to the same status.
    ///
    /// Devices stay in the box while the new status can hold one (any
    /// Disposed sub-status except Deleted (Mistake)); otherwise they leave it
    /// and the box prefix is dropped from their notes.
    pub async fn update_box_status(
        &self,
        box_id: &str,
        status: &str,
        sub_status: &str,
    ) -> AppResult<u64> {
        self.taxonomy.validate(status, sub_status)?;
        let box_id = normalize_box_id(Some(box_id))
            .ok_or_else(|| AppError::validation("Box ID is required"))?;

        let keeps_box = self.taxonomy.can_hold_box(status, sub_status);

        let txn = self.db.begin().await?;
        let outcome = async {
            let members = contents(&txn, &box_id).await?;
            if members.is_empty() {
                return Err(AppError::not_found(format!("Box {} is empty", box_id)));
            }

            if !keeps_box {
                let now = Utc::now().naive_utc();
                for member in &members {
                    DeviceStatus::update_many()
                        .col_expr(device_status::Column::Status, Expr::value(status.to_string()))
                        .col_expr(
                            device_status::Column::SubStatus,
                            Expr::value(sub_status.to_string()),
                        )
                        .col_expr(device_status::Column::LastUpdate, Expr::value(now))
                        .col_expr(
                            device_status::Column::Note,
                            Expr::value(strip_box_note(member.note.as_deref())),
                        )
                        .col_expr(device_status::Column::BoxId, Expr::value(Option::<String>::None))
                        .col_expr(
                            device_status::Column::Version,
                            Expr::col(device_status::Column::Version).add(1),
                        )
                        .filter(device_status::Column::ReceiptId.eq(member.receipt_id))
                        .exec(&txn)
                        .await?;
                }
                return Ok(members.len() as u64);
            }

            let ids: Vec<i32> = members.iter().map(|c| c.receipt_id).collect();
            let result = DeviceStatus::update_many()
                .col_expr(device_status::Column::Status, Expr::value(status.to_string()))
                .col_expr(device_status::Column::SubStatus, Expr::value(sub_status.to_string()))
                .col_expr(device_status::Column::LastUpdate, Expr::value(Utc::now().naive_utc()))
                .col_expr(
                    device_status::Column::Version,
                    Expr::col(device_status::Column::Version).add(1),
                )
                .filter(device_status::Column::ReceiptId.is_in(ids))
                .exec(&txn)
                .await?;
            Ok::<_, AppError>(result.rows_affected)
        }
        .await;

        let updated = status_store::finish(txn, outcome).await?;
        info!(box_id = %box_id, updated = updated, status = %status, sub_status = %sub_status, "Updated box status");
        Ok(updated)
    }

    /// Take devices out of whatever box they are in and queue them for wipe.
    pub async fn remove_from_box(&self, serials: &[String]) -> AppResult<RemoveResult> {
        let serials: Vec<String> = serials
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if serials.is_empty() {
            return Err(AppError::validation("Please enter at least one serial number"));
        }

        let txn = self.db.begin().await?;
        let outcome = async {
            let current = status_store::current_status_rows(&txn, &serials).await?;
            let mut result = RemoveResult::default();

            for serial in &serials {
                let Some(row) = current.get(serial).filter(|r| location_of(r).is_some()) else {
                    result.not_in_box.push(serial.clone());
                    continue;
                };
                if result.removed.contains(serial) {
                    continue;
                }

                DeviceStatus::update_many()
                    .col_expr(device_status::Column::Status, Expr::value(STATUS_DISPOSED))
                    .col_expr(device_status::Column::SubStatus, Expr::value(SUB_READY_FOR_WIPE))
                    .col_expr(device_status::Column::LastUpdate, Expr::value(Utc::now().naive_utc()))
                    .col_expr(
                        device_status::Column::Note,
                        Expr::value(Some(REMOVED_FROM_BOX_NOTE.to_string())),
                    )
                    .col_expr(device_status::Column::BoxId, Expr::value(Option::<String>::None))
                    .col_expr(device_status::Column::Version, Expr::value(row.version + 1))
                    .filter(device_status::Column::ReceiptId.eq(row.receipt_id))
                    .exec(&txn)
                    .await?;
                result.removed.push(serial.clone());
            }
            Ok::<_, AppError>(result)
        }
        .await;

        let result = status_store::finish(txn, outcome).await?;
        info!(
            removed = result.removed.len(),
            not_in_box = result.not_in_box.len(),
            "Removed devices from boxes"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub scanned: u64,
    pub updated: u64,
}

/// Copy box ids out of legacy notes into the `box_id` column.
///
/// Only rows whose column is still empty are touched. With `dry_run` the
/// rows are counted but not written.
pub async fn backfill_legacy_box_ids(
    db: &DatabaseConnection,
    dry_run: bool,
) -> AppResult<BackfillReport> {
    let txn = db.begin().await?;
    let outcome = async {
        let rows = DeviceStatus::find()
            .filter(device_status::Column::BoxId.is_null())
            .filter(device_status::Column::Note.like("Box ID:%"))
            .all(&txn)
            .await?;

        let mut report = BackfillReport::default();
        for row in rows {
            report.scanned += 1;
            let Some(box_id) = row.note.as_deref().and_then(parse_box_id) else {
                continue;
            };
            if dry_run {
                report.updated += 1;
                continue;
            }

            let result = DeviceStatus::update_many()
                .col_expr(device_status::Column::BoxId, Expr::value(Some(box_id)))
                .col_expr(device_status::Column::Version, Expr::value(row.version + 1))
                .filter(device_status::Column::Id.eq(row.id))
                .filter(device_status::Column::Version.eq(row.version))
                .exec(&txn)
                .await?;
            report.updated += result.rows_affected;
        }
        Ok::<_, AppError>(report)
    }
    .await;

    let report = status_store::finish(txn, outcome).await?;
    info!(scanned = report.scanned, updated = report.updated, dry_run = dry_run, "Box id backfill complete");
    Ok(report)
}

/// Current devices in a box, ordered by serial.
async fn contents<C: ConnectionTrait>(conn: &C, box_id: &str) -> AppResult<Vec<BoxContent>> {
    let Some(box_id) = normalize_box_id(Some(box_id)) else {
        return Err(AppError::validation("Box ID is required"));
    };

    let mut params = SqlParams::new(conn.get_database_backend());
    let sql = format!(
        "SELECT re.receipt_id, re.serial_number, ds.status, ds.sub_status, ds.note, ds.last_update \
         FROM ({}) re JOIN device_status ds ON ds.receipt_id = re.receipt_id \
         WHERE ds.box_id = {} ORDER BY re.serial_number",
        LATEST_RECEIPTS_SQL,
        params.push(box_id)
    );

    Ok(BoxContent::find_by_statement(params.statement(sql))
        .all(conn)
        .await?)
}
