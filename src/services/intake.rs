//! Intake orchestration
//!
//! Turns a batch of received serials into asset, receipt, status and
//! disposition rows. A batch is all-or-nothing: everything runs inside one
//! transaction and any failure rolls back every row written so far.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::entities::{device_status, disposition_info, prelude::*};
use crate::error::{AppError, AppResult};
use crate::services::asset_registry::{self, AssetDetails, AssetSource};
use crate::services::disposition_rules::{self, Disposition, ScrapRequest};
use crate::services::packages;
use crate::services::receipt_ledger;
use crate::services::taxonomy::StatusTaxonomy;

/// Per-batch switches that feed the rule engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeFlags {
    #[serde(default)]
    pub is_new_condition: bool,
    #[serde(default)]
    pub scrap: Option<ScrapRequest>,
}

impl IntakeFlags {
    /// Checks the scrap request, if any, against the taxonomy.
    pub fn validate(&self, taxonomy: &StatusTaxonomy) -> AppResult<()> {
        match &self.scrap {
            Some(scrap) => scrap.validate(taxonomy),
            None => Ok(()),
        }
    }
}

/// Fails when no serial is left after trimming blanks.
pub fn require_serials<'s>(serials: impl IntoIterator<Item = &'s str>) -> AppResult<()> {
    if serials.into_iter().all(|s| s.trim().is_empty()) {
        return Err(AppError::validation(
            "Please enter at least one serial number",
        ));
    }
    Ok(())
}

/// One row of a table-style intake: serial plus its own asset details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRow {
    pub serial_number: String,
    #[serde(flatten)]
    pub details: AssetDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success_count: usize,
    pub duplicate_count: usize,
    /// Serials that got a new asset master row in this batch
    pub new_asset_count: usize,
    /// Serials that already had a master row
    pub return_count: usize,
    pub receipt_ids: Vec<i32>,
}

pub struct IntakeOrchestrator<'a> {
    db: &'a DatabaseConnection,
    taxonomy: &'a StatusTaxonomy,
}

impl<'a> IntakeOrchestrator<'a> {
    pub fn new(db: &'a DatabaseConnection, taxonomy: &'a StatusTaxonomy) -> Self {
        Self { db, taxonomy }
    }

    /// Receive a list of serials that share one set of asset details.
    pub async fn process_serial_list(
        &self,
        package_id: i32,
        serials: &[String],
        common: &AssetDetails,
        flags: &IntakeFlags,
        cancel: &CancellationToken,
    ) -> AppResult<BatchResult> {
        let items: Vec<(&str, &AssetDetails)> =
            serials.iter().map(|s| (s.as_str(), common)).collect();
        self.run_batch(package_id, items, flags, cancel).await
    }

    /// Receive table rows, each carrying its own asset details.
    pub async fn process_table_rows(
        &self,
        package_id: i32,
        rows: &[IntakeRow],
        flags: &IntakeFlags,
        cancel: &CancellationToken,
    ) -> AppResult<BatchResult> {
        let items: Vec<(&str, &AssetDetails)> = rows
            .iter()
            .map(|r| (r.serial_number.as_str(), &r.details))
            .collect();
        self.run_batch(package_id, items, flags, cancel).await
    }

    async fn run_batch(
        &self,
        package_id: i32,
        items: Vec<(&str, &AssetDetails)>,
        flags: &IntakeFlags,
        cancel: &CancellationToken,
    ) -> AppResult<BatchResult> {
        // Validation happens before any transaction is opened
        let items: Vec<(&str, &AssetDetails)> = items
            .into_iter()
            .map(|(serial, details)| (serial.trim(), details))
            .filter(|(serial, _)| !serial.is_empty())
            .collect();

        require_serials(items.iter().map(|(serial, _)| *serial))?;
        flags.validate(self.taxonomy)?;
        packages::find(self.db, package_id).await?;

        info!(
            package_id = package_id,
            rows = items.len(),
            is_new_condition = flags.is_new_condition,
            scrap = flags.scrap.is_some(),
            "Starting intake batch"
        );

        let txn = self.db.begin().await?;
        match self.write_rows(&txn, package_id, &items, flags, cancel).await {
            Ok(result) => {
                txn.commit().await?;
                info!(
                    package_id = package_id,
                    success = result.success_count,
                    duplicates = result.duplicate_count,
                    new_assets = result.new_asset_count,
                    returns = result.return_count,
                    "Intake batch committed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(package_id = package_id, error = %e, "Intake batch failed, rolling back");
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn write_rows(
        &self,
        txn: &DatabaseTransaction,
        package_id: i32,
        items: &[(&str, &AssetDetails)],
        flags: &IntakeFlags,
        cancel: &CancellationToken,
    ) -> AppResult<BatchResult> {
        let mut result = BatchResult::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for &(serial, supplied) in items {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            if !seen.insert(serial) {
                debug!(serial = %serial, "Skipping duplicate serial in batch");
                result.duplicate_count += 1;
                continue;
            }

            let existing = asset_registry::find_by_serial(txn, serial).await?;
            let details = asset_registry::merge_asset_details(existing.as_ref(), supplied);

            match existing.as_ref().map(|e| e.source) {
                Some(AssetSource::Primary) => result.return_count += 1,
                Some(AssetSource::History) | None => {
                    asset_registry::create(txn, serial, &details).await?;
                    result.new_asset_count += 1;
                }
            }

            let receipt_id = receipt_ledger::append(txn, serial, package_id, &details).await?;

            let flag = FlaggedDevices::find_by_id(serial.to_string()).one(txn).await?;
            let disposition = disposition_rules::decide(
                flag.as_ref().map(|f| f.flag_reason.as_deref()),
                flags.scrap.as_ref(),
                flags.is_new_condition,
            )?;

            persist_disposition(txn, receipt_id, &disposition).await?;

            debug!(
                serial = %serial,
                receipt_id = receipt_id,
                status = %disposition.status,
                sub_status = %disposition.sub_status,
                rule = ?disposition.rule,
                "Recorded intake"
            );

            result.receipt_ids.push(receipt_id);
            result.success_count += 1;
        }

        Ok(result)
    }
}

/// Write the status row (always) and the disposition note (when non-blank)
/// for a new receipt.
async fn persist_disposition(
    txn: &DatabaseTransaction,
    receipt_id: i32,
    disposition: &Disposition,
) -> AppResult<()> {
    device_status::ActiveModel {
        receipt_id: Set(receipt_id),
        status: Set(disposition.status.clone()),
        sub_status: Set(disposition.sub_status.clone()),
        last_update: Set(Utc::now().naive_utc()),
        note: Set(disposition.note.clone()),
        box_id: Set(disposition.box_id.clone()),
        version: Set(1),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    if let Some(note) = disposition.note.as_deref().filter(|n| !n.trim().is_empty()) {
        disposition_info::ActiveModel {
            receipt_id: Set(receipt_id),
            other_disqualification: Set(Some(note.to_string())),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    Ok(())
}
