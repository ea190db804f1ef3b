//! Current-status read model and bulk mutations
//!
//! "Current" means the device status attached to the latest receipt of each
//! serial, derived with a window function over `receipt_events`. Mutations
//! are conditional on the row version read inside the same transaction, so a
//! concurrent batch touching the same receipts fails with a conflict instead
//! of being silently overwritten.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, EntityTrait, FromQueryResult, QueryFilter, Statement, TransactionTrait,
    Value,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entities::{device_status, flagged_devices, prelude::*, receipt_events};
use crate::error::{AppError, AppResult};
use crate::services::box_index;
use crate::services::disposition_rules::{box_note, normalize_box_id};
use crate::services::receipt_ledger;
use crate::services::taxonomy::{StatusTaxonomy, STATUS_FLAG};

/// Latest receipt per serial (rank 1 within each serial partition)
pub(crate) const LATEST_RECEIPTS_SQL: &str = r#"
    SELECT receipt_id, serial_number, category, make, description
    FROM (
        SELECT receipt_id, serial_number, category, make, description,
               ROW_NUMBER() OVER (PARTITION BY serial_number ORDER BY receipt_id DESC) AS rn
        FROM receipt_events
    ) ranked
    WHERE rn = 1
"#;

/// Collects bind values and renders backend-specific placeholders.
pub(crate) struct SqlParams {
    backend: DatabaseBackend,
    values: Vec<Value>,
}

impl SqlParams {
    pub(crate) fn new(backend: DatabaseBackend) -> Self {
        Self {
            backend,
            values: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        match self.backend {
            DatabaseBackend::Postgres => format!("${}", self.values.len()),
            _ => "?".to_string(),
        }
    }

    pub(crate) fn statement(self, sql: String) -> Statement {
        Statement::from_sql_and_values(self.backend, sql, self.values)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFilters {
    /// Substring match on serial number
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sub_status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Inclusive lower bound on last update (start of day)
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper bound on last update (end of day)
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    LastUpdate,
    Status,
    Category,
}

impl SortBy {
    fn order_clause(self) -> &'static str {
        match self {
            SortBy::LastUpdate => "ds.last_update DESC, re.receipt_id DESC",
            SortBy::Status => "ds.status ASC, ds.last_update DESC, re.receipt_id DESC",
            SortBy::Category => {
                "COALESCE(a.category, re.category) ASC, ds.last_update DESC, re.receipt_id DESC"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// LIMIT and OFFSET as SQL integers.
    fn limit_offset(self) -> AppResult<(i64, i64)> {
        if self.page_size == 0 {
            return Err(AppError::validation("Page size must be at least 1"));
        }
        let limit = i64::try_from(self.page_size)
            .map_err(|_| AppError::validation("Page size is too large"))?;
        let offset = self
            .page
            .checked_mul(self.page_size)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(|| AppError::validation("Page index is out of range"))?;
        Ok((limit, offset))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusView {
    pub receipt_id: i32,
    pub serial_number: String,
    pub category: Option<String>,
    pub make: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub sub_status: String,
    pub last_update: NaiveDateTime,
    pub note: Option<String>,
    pub box_id: Option<String>,
    pub version: i32,
    pub is_flagged: bool,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total: i64,
}

/// Whether a batch commits the rows it could apply or rolls back entirely
/// when any requested serial is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomicityMode {
    AllOrNothing,
    #[default]
    PartialSuccess,
}

/// Requested status change, before validation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: String,
    pub sub_status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub box_id: Option<String>,
}

/// Validated change ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedChange {
    status: String,
    sub_status: String,
    note: Option<String>,
    box_id: Option<String>,
}

impl StatusChange {
    /// Checks the pair and box requirement without writing anything.
    pub fn validate(&self, taxonomy: &StatusTaxonomy) -> AppResult<()> {
        self.resolve(taxonomy).map(|_| ())
    }

    fn resolve(&self, taxonomy: &StatusTaxonomy) -> AppResult<ResolvedChange> {
        taxonomy.validate(&self.status, &self.sub_status)?;

        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let box_id = if taxonomy.can_hold_box(&self.status, &self.sub_status) {
            normalize_box_id(self.box_id.as_deref())
        } else {
            None
        };

        let requires_box = taxonomy.requires_box_id(&self.status, &self.sub_status);
        if requires_box && box_id.is_none() {
            return Err(AppError::validation(format!(
                "A Box ID is required for status '{} / {}'",
                self.status, self.sub_status
            )));
        }

        let note = match &box_id {
            Some(id) if requires_box => Some(box_note(id, note)),
            _ => note.map(str::to_string),
        };

        Ok(ResolvedChange {
            status: self.status.clone(),
            sub_status: self.sub_status.clone(),
            note,
            box_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub updated: Vec<String>,
    pub not_found: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMoveResult {
    pub moved: Vec<String>,
    pub not_found_or_failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHistoryEntry {
    pub receipt_id: i32,
    pub package_id: i32,
    pub received_at: NaiveDateTime,
    pub category: Option<String>,
    pub make: Option<String>,
    pub model_number: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub sub_status: Option<String>,
    pub note: Option<String>,
}

pub struct StatusLifecycleStore<'a> {
    db: &'a DatabaseConnection,
    taxonomy: &'a StatusTaxonomy,
}

impl<'a> StatusLifecycleStore<'a> {
    pub fn new(db: &'a DatabaseConnection, taxonomy: &'a StatusTaxonomy) -> Self {
        Self { db, taxonomy }
    }

    /// Filtered, paginated view of current device status.
    pub async fn query(
        &self,
        filters: &StatusFilters,
        sort: SortBy,
        page: PageRequest,
    ) -> AppResult<Page<DeviceStatusView>> {
        let backend = self.db.get_database_backend();

        let mut count_params = SqlParams::new(backend);
        let count_where = build_where(filters, &mut count_params);
        let count_sql = format!(
            "SELECT COUNT(*) AS total {} {}",
            current_status_from(),
            count_where
        );
        let total = CountRow::find_by_statement(count_params.statement(count_sql))
            .one(self.db)
            .await?
            .map(|r| r.total.max(0) as u64)
            .unwrap_or(0);

        let (limit, offset) = page.limit_offset()?;
        let mut params = SqlParams::new(backend);
        let where_clause = build_where(filters, &mut params);
        let limit = params.push(limit);
        let offset = params.push(offset);
        let sql = format!(
            "{} {} {} ORDER BY {} LIMIT {} OFFSET {}",
            CURRENT_STATUS_SELECT,
            current_status_from(),
            where_clause,
            sort.order_clause(),
            limit,
            offset
        );

        let items = DeviceStatusView::find_by_statement(params.statement(sql))
            .all(self.db)
            .await?;

        debug!(
            total = total,
            returned = items.len(),
            page = page.page,
            "Queried device status"
        );

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// Current status of one serial, if it was ever received.
    pub async fn current_for_serial(&self, serial: &str) -> AppResult<Option<DeviceStatusView>> {
        let mut params = SqlParams::new(self.db.get_database_backend());
        let placeholder = params.push(serial.trim().to_string());
        let sql = format!(
            "{} {} WHERE re.serial_number = {}",
            CURRENT_STATUS_SELECT,
            current_status_from(),
            placeholder
        );
        Ok(DeviceStatusView::find_by_statement(params.statement(sql))
            .one(self.db)
            .await?)
    }

    /// Every receipt for a serial with the status attached to it, newest first.
    pub async fn history(&self, serial: &str) -> AppResult<Vec<DeviceHistoryEntry>> {
        let receipts = receipt_ledger::history(self.db, serial.trim()).await?;
        let ids: Vec<i32> = receipts.iter().map(|r| r.receipt_id).collect();
        let statuses: HashMap<i32, device_status::Model> = DeviceStatus::find()
            .filter(device_status::Column::ReceiptId.is_in(ids))
            .all(self.db)
            .await?
            .into_iter()
            .map(|s| (s.receipt_id, s))
            .collect();

        Ok(receipts
            .into_iter()
            .map(|r| {
                let status = statuses.get(&r.receipt_id);
                DeviceHistoryEntry {
                    receipt_id: r.receipt_id,
                    package_id: r.package_id,
                    received_at: r.received_at,
                    category: r.category,
                    make: r.make,
                    model_number: r.model_number,
                    description: r.description,
                    status: status.map(|s| s.status.clone()),
                    sub_status: status.map(|s| s.sub_status.clone()),
                    note: status.and_then(|s| s.note.clone()),
                }
            })
            .collect())
    }

    /// Update the given receipts in one transaction.
    ///
    /// All-or-nothing: an unknown receipt id or a version mismatch rolls back
    /// every row. Rows currently in `Flag!` that move to another status have
    /// their flag removed in the same transaction. Disposition notes are left
    /// untouched.
    pub async fn update_status(
        &self,
        receipt_ids: &[i32],
        change: &StatusChange,
        expected_versions: Option<&HashMap<i32, i32>>,
    ) -> AppResult<Vec<i32>> {
        let change = change.resolve(self.taxonomy)?;
        let ids = require_receipt_ids(receipt_ids)?;

        let txn = self.db.begin().await?;
        let outcome = async {
            let rows: HashMap<i32, device_status::Model> = DeviceStatus::find()
                .filter(device_status::Column::ReceiptId.is_in(ids.clone()))
                .all(&txn)
                .await?
                .into_iter()
                .map(|r| (r.receipt_id, r))
                .collect();

            let mut flagged_receipts = Vec::new();
            for id in &ids {
                let row = rows
                    .get(id)
                    .ok_or_else(|| AppError::not_found(format!("Receipt {} has no status", id)))?;
                let expected = expected_versions
                    .and_then(|v| v.get(id).copied())
                    .unwrap_or(row.version);

                apply_change(&txn, row, expected, &change).await?;

                if row.status == STATUS_FLAG {
                    flagged_receipts.push(*id);
                }
            }

            if change.status != STATUS_FLAG && !flagged_receipts.is_empty() {
                clear_flags_for_receipts(&txn, &flagged_receipts).await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        finish(txn, outcome).await?;
        info!(
            count = ids.len(),
            status = %change.status,
            sub_status = %change.sub_status,
            "Updated device status"
        );
        Ok(ids)
    }

    /// Update the current receipt of each serial.
    ///
    /// Serials without any receipt are reported in `not_found`. Under
    /// `PartialSuccess` the found rows are committed; under `AllOrNothing` a
    /// single missing serial rolls back the batch.
    pub async fn bulk_update_by_serial(
        &self,
        serials: &[String],
        change: &StatusChange,
        mode: AtomicityMode,
    ) -> AppResult<BulkUpdateResult> {
        let change = change.resolve(self.taxonomy)?;
        let serials = require_serials(serials)?;

        let txn = self.db.begin().await?;
        let outcome = async {
            let current = current_status_rows(&txn, &serials).await?;

            let mut result = BulkUpdateResult::default();
            let mut flagged_receipts = Vec::new();
            for serial in &serials {
                match current.get(serial) {
                    Some(row) => {
                        apply_change(&txn, row, row.version, &change).await?;
                        if row.status == STATUS_FLAG {
                            flagged_receipts.push(row.receipt_id);
                        }
                        result.updated.push(serial.clone());
                    }
                    None => result.not_found.push(serial.clone()),
                }
            }

            if mode == AtomicityMode::AllOrNothing && !result.not_found.is_empty() {
                return Err(AppError::not_found(format!(
                    "No receipt for serial(s): {}",
                    result.not_found.join(", ")
                )));
            }

            if change.status != STATUS_FLAG && !flagged_receipts.is_empty() {
                clear_flags_for_receipts(&txn, &flagged_receipts).await?;
            }
            Ok::<_, AppError>(result)
        }
        .await;

        let result = finish(txn, outcome).await?;
        info!(
            updated = result.updated.len(),
            not_found = result.not_found.len(),
            mode = ?mode,
            "Bulk status update complete"
        );
        Ok(result)
    }

    /// Move devices from one box to another.
    ///
    /// Only serials whose current status sits in `source_box_id` are moved;
    /// every other serial is reported in `not_found_or_failed`.
    pub async fn bulk_move(
        &self,
        source_box_id: &str,
        destination_box_id: &str,
        serials: &[String],
        mode: AtomicityMode,
    ) -> AppResult<BulkMoveResult> {
        let (source, destination) = move_endpoints(source_box_id, destination_box_id)?;
        let serials = require_serials(serials)?;

        let txn = self.db.begin().await?;
        let outcome = async {
            let current = current_status_rows(&txn, &serials).await?;

            let mut result = BulkMoveResult::default();
            for serial in &serials {
                let row = match current.get(serial) {
                    Some(row) if box_index::location_of(row).as_deref() == Some(source.as_str()) => {
                        row
                    }
                    _ => {
                        result.not_found_or_failed.push(serial.clone());
                        continue;
                    }
                };

                let note = box_index::rewrite_box_note(row.note.as_deref(), &destination);
                let updated = DeviceStatus::update_many()
                    .col_expr(device_status::Column::BoxId, Expr::value(Some(destination.clone())))
                    .col_expr(device_status::Column::Note, Expr::value(Some(note)))
                    .col_expr(device_status::Column::Version, Expr::value(row.version + 1))
                    .filter(device_status::Column::ReceiptId.eq(row.receipt_id))
                    .filter(device_status::Column::Version.eq(row.version))
                    .exec(&txn)
                    .await?;

                if updated.rows_affected == 0 {
                    result.not_found_or_failed.push(serial.clone());
                } else {
                    result.moved.push(serial.clone());
                }
            }

            if mode == AtomicityMode::AllOrNothing && !result.not_found_or_failed.is_empty() {
                return Err(AppError::not_found(format!(
                    "Not in box {}: {}",
                    source,
                    result.not_found_or_failed.join(", ")
                )));
            }
            Ok::<_, AppError>(result)
        }
        .await;

        let result = finish(txn, outcome).await?;
        info!(
            source = %source,
            destination = %destination,
            moved = result.moved.len(),
            failed = result.not_found_or_failed.len(),
            "Bulk box move complete"
        );
        Ok(result)
    }
}

const CURRENT_STATUS_SELECT: &str = r#"
    SELECT re.receipt_id,
           re.serial_number,
           COALESCE(a.category, re.category) AS category,
           COALESCE(a.make, re.make) AS make,
           COALESCE(a.description, re.description) AS description,
           ds.status,
           ds.sub_status,
           ds.last_update,
           ds.note,
           ds.box_id,
           ds.version,
           EXISTS (SELECT 1 FROM flagged_devices fd WHERE fd.serial_number = re.serial_number) AS is_flagged
"#;

fn current_status_from() -> String {
    format!(
        "FROM ({}) re JOIN device_status ds ON ds.receipt_id = re.receipt_id \
         LEFT JOIN assets a ON a.serial_number = re.serial_number",
        LATEST_RECEIPTS_SQL
    )
}

fn build_where(filters: &StatusFilters, params: &mut SqlParams) -> String {
    let mut clauses: Vec<String> = Vec::new();
    let text = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(serial) = text(&filters.serial) {
        clauses.push(format!(
            "UPPER(re.serial_number) LIKE {} ESCAPE '\\'",
            params.push(contains_pattern(&serial))
        ));
    }
    if let Some(status) = text(&filters.status) {
        clauses.push(format!("ds.status = {}", params.push(status)));
    }
    if let Some(sub_status) = text(&filters.sub_status) {
        clauses.push(format!("ds.sub_status = {}", params.push(sub_status)));
    }
    if let Some(category) = text(&filters.category) {
        clauses.push(format!(
            "COALESCE(a.category, re.category) = {}",
            params.push(category)
        ));
    }
    if let Some(from) = filters.from_date {
        let start = from.and_hms_opt(0, 0, 0).unwrap_or_default();
        clauses.push(format!("ds.last_update >= {}", params.push(start)));
    }
    if let Some(to) = filters.to_date {
        let end = (to + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap_or_default();
        clauses.push(format!("ds.last_update < {}", params.push(end)));
    }

    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

/// Case-insensitive `LIKE` pattern matching `text` literally anywhere in the
/// value. Pair with `ESCAPE '\'` and an upper-cased column.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.to_uppercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Distinct receipt ids in request order; empty is a validation error.
pub fn require_receipt_ids(receipt_ids: &[i32]) -> AppResult<Vec<i32>> {
    let mut seen = HashSet::new();
    let ids: Vec<i32> = receipt_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if ids.is_empty() {
        return Err(AppError::validation("Select one or more devices to update"));
    }
    Ok(ids)
}

/// Trimmed, distinct serials; empty is a validation error.
pub fn require_serials(serials: &[String]) -> AppResult<Vec<String>> {
    let serials = dedupe_serials(serials);
    if serials.is_empty() {
        return Err(AppError::validation("Please enter at least one serial number"));
    }
    Ok(serials)
}

/// Normalised source and destination box ids for a move.
pub fn move_endpoints(source: &str, destination: &str) -> AppResult<(String, String)> {
    let source = normalize_box_id(Some(source))
        .ok_or_else(|| AppError::validation("Source Box ID is required"))?;
    let destination = normalize_box_id(Some(destination))
        .ok_or_else(|| AppError::validation("Destination Box ID is required"))?;
    if source == destination {
        return Err(AppError::validation(
            "Source and destination Box IDs cannot be the same",
        ));
    }
    Ok((source, destination))
}

fn dedupe_serials(serials: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    serials
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Current status row for each serial that has one.
pub(crate) async fn current_status_rows<C: ConnectionTrait>(
    conn: &C,
    serials: &[String],
) -> AppResult<HashMap<String, device_status::Model>> {
    let latest = receipt_ledger::find_latest_receipt_ids(conn, serials).await?;
    if latest.is_empty() {
        return Ok(HashMap::new());
    }

    let ids: Vec<i32> = latest.values().copied().collect();
    let mut by_receipt: HashMap<i32, device_status::Model> = DeviceStatus::find()
        .filter(device_status::Column::ReceiptId.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| (r.receipt_id, r))
        .collect();

    Ok(latest
        .into_iter()
        .filter_map(|(serial, id)| by_receipt.remove(&id).map(|row| (serial, row)))
        .collect())
}

async fn apply_change(
    txn: &DatabaseTransaction,
    row: &device_status::Model,
    expected_version: i32,
    change: &ResolvedChange,
) -> AppResult<()> {
    let result = DeviceStatus::update_many()
        .col_expr(device_status::Column::Status, Expr::value(change.status.clone()))
        .col_expr(device_status::Column::SubStatus, Expr::value(change.sub_status.clone()))
        .col_expr(device_status::Column::LastUpdate, Expr::value(Utc::now().naive_utc()))
        .col_expr(device_status::Column::Note, Expr::value(change.note.clone()))
        .col_expr(device_status::Column::BoxId, Expr::value(change.box_id.clone()))
        .col_expr(device_status::Column::Version, Expr::value(expected_version + 1))
        .filter(device_status::Column::ReceiptId.eq(row.receipt_id))
        .filter(device_status::Column::Version.eq(expected_version))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "Receipt {} was modified by another operation (expected version {})",
            row.receipt_id, expected_version
        )));
    }
    Ok(())
}

async fn clear_flags_for_receipts(txn: &DatabaseTransaction, receipt_ids: &[i32]) -> AppResult<()> {
    let serials: Vec<String> = ReceiptEvents::find()
        .filter(receipt_events::Column::ReceiptId.is_in(receipt_ids.to_vec()))
        .all(txn)
        .await?
        .into_iter()
        .map(|r| r.serial_number)
        .collect();

    let deleted = FlaggedDevices::delete_many()
        .filter(flagged_devices::Column::SerialNumber.is_in(serials))
        .exec(txn)
        .await?;

    debug!(flags_cleared = deleted.rows_affected, "Cleared resolved flags");
    Ok(())
}

/// Commit on success, roll back on failure.
pub(crate) async fn finish<T>(txn: DatabaseTransaction, outcome: AppResult<T>) -> AppResult<T> {
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            warn!(error = %e, "Rolling back status batch");
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
