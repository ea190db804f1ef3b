//! Flagged devices
//!
//! A flag is keyed by serial, not by receipt. While it exists every intake of
//! the serial lands in `Flag! / Requires Review`. Manually moving a flagged
//! device to another status removes the flag (see `status_store`).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};
use serde::Serialize;

use crate::entities::{flagged_devices, prelude::*};
use crate::error::{AppError, AppResult};

/// Reason prefix that tells downstream tooling to leave directory records alone
pub const NO_REMOVE_TAG: &str = "[NOREMOVE]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRecord {
    pub serial_number: String,
    pub reason: Option<String>,
    pub prevents_auto_removal: bool,
}

impl From<flagged_devices::Model> for FlagRecord {
    fn from(m: flagged_devices::Model) -> Self {
        let prevents_auto_removal = m
            .flag_reason
            .as_deref()
            .is_some_and(|r| r.starts_with(NO_REMOVE_TAG));
        Self {
            serial_number: m.serial_number,
            reason: m.flag_reason,
            prevents_auto_removal,
        }
    }
}

/// Create or replace the flag on a serial.
pub async fn flag<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
    reason: Option<&str>,
) -> AppResult<FlagRecord> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(AppError::validation("Serial number is required"));
    }
    let reason = reason.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string);
    let now = Utc::now().naive_utc();

    let saved = match FlaggedDevices::find_by_id(serial.to_string()).one(conn).await? {
        Some(existing) => {
            let mut active: flagged_devices::ActiveModel = existing.into();
            active.flag_reason = Set(reason);
            active.flagged_at = Set(now);
            active.update(conn).await?
        }
        None => {
            flagged_devices::ActiveModel {
                serial_number: Set(serial.to_string()),
                flag_reason: Set(reason),
                flagged_at: Set(now),
            }
            .insert(conn)
            .await?
        }
    };

    tracing::info!(serial = %serial, "Flagged device");
    Ok(saved.into())
}

/// Returns whether a flag was removed.
pub async fn unflag<C: ConnectionTrait>(conn: &C, serial: &str) -> AppResult<bool> {
    let result = FlaggedDevices::delete_by_id(serial.trim().to_string())
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

pub async fn get<C: ConnectionTrait>(conn: &C, serial: &str) -> AppResult<Option<FlagRecord>> {
    Ok(FlaggedDevices::find_by_id(serial.trim().to_string())
        .one(conn)
        .await?
        .map(FlagRecord::from))
}

pub async fn list<C: ConnectionTrait>(conn: &C) -> AppResult<Vec<FlagRecord>> {
    Ok(FlaggedDevices::find()
        .order_by_asc(flagged_devices::Column::SerialNumber)
        .all(conn)
        .await?
        .into_iter()
        .map(FlagRecord::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_remove_tag() {
        let record: FlagRecord = flagged_devices::Model {
            serial_number: "S1".to_string(),
            flag_reason: Some("[NOREMOVE] legal hold".to_string()),
            flagged_at: Utc::now().naive_utc(),
        }
        .into();
        assert!(record.prevents_auto_removal);

        let record: FlagRecord = flagged_devices::Model {
            serial_number: "S2".to_string(),
            flag_reason: None,
            flagged_at: Utc::now().naive_utc(),
        }
        .into();
        assert!(!record.prevents_auto_removal);
    }
}
