//! Asset master registry
//!
//! Lookup goes to the `assets` table first and only falls back to the
//! read-only `asset_history` autofill table when no master row exists. The
//! two sources are never merged field by field.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::entities::{asset_history, assets, prelude::*};
use crate::error::AppResult;

/// Descriptive fields of an asset, as supplied by callers or read from storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetails {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub imei: Option<String>,
    #[serde(default)]
    pub capacity: Option<String>,
    #[serde(default)]
    pub everon_serial: bool,
}

impl AssetDetails {
    /// Trim every text field and turn blanks into `None`.
    pub fn normalized(&self) -> Self {
        Self {
            make: clean(&self.make),
            model_number: clean(&self.model_number),
            description: clean(&self.description),
            category: clean(&self.category),
            imei: clean(&self.imei),
            capacity: clean(&self.capacity),
            everon_serial: self.everon_serial,
        }
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl From<assets::Model> for AssetDetails {
    fn from(m: assets::Model) -> Self {
        Self {
            make: m.make,
            model_number: m.model_number,
            description: m.description,
            category: m.category,
            imei: m.imei,
            capacity: m.capacity,
            everon_serial: m.everon_serial,
        }
    }
}

impl From<asset_history::Model> for AssetDetails {
    fn from(m: asset_history::Model) -> Self {
        Self {
            make: m.make,
            model_number: m.model_number,
            description: m.description,
            category: m.category,
            imei: m.imei,
            capacity: m.capacity,
            everon_serial: m.everon_serial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    /// Row in the asset master table
    Primary,
    /// Autofill row from the history table; no master row exists yet
    History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLookup {
    pub source: AssetSource,
    pub details: AssetDetails,
}

impl AssetLookup {
    pub fn is_registered(&self) -> bool {
        self.source == AssetSource::Primary
    }
}

/// Return the first hit: master table, then history table.
pub async fn find_by_serial<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
) -> AppResult<Option<AssetLookup>> {
    if let Some(asset) = Assets::find()
        .filter(assets::Column::SerialNumber.eq(serial))
        .one(conn)
        .await?
    {
        return Ok(Some(AssetLookup {
            source: AssetSource::Primary,
            details: asset.into(),
        }));
    }

    let history = AssetHistory::find_by_id(serial.to_string()).one(conn).await?;
    Ok(history.map(|h| AssetLookup {
        source: AssetSource::History,
        details: h.into(),
    }))
}

/// Insert a new master row.
///
/// No upsert: callers check for an existing row first. Blank text fields,
/// including an empty IMEI, are stored as NULL.
pub async fn create<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
    details: &AssetDetails,
) -> AppResult<assets::Model> {
    let details = details.normalized();

    let model = assets::ActiveModel {
        serial_number: Set(serial.to_string()),
        make: Set(details.make),
        model_number: Set(details.model_number),
        description: Set(details.description),
        category: Set(details.category),
        imei: Set(details.imei),
        capacity: Set(details.capacity),
        everon_serial: Set(details.everon_serial),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    tracing::debug!(serial = %serial, asset_id = model.id, "Registered new asset");
    Ok(model)
}

/// Resolve the details used for an intake snapshot.
///
/// Any stored record (master or history) wins wholesale over the caller's
/// details; the caller's details are only used for serials never seen before.
pub fn merge_asset_details(existing: Option<&AssetLookup>, supplied: &AssetDetails) -> AssetDetails {
    match existing {
        Some(lookup) => lookup.details.normalized(),
        None => supplied.normalized(),
    }
}
