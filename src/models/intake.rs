use serde::Deserialize;

use crate::services::asset_registry::AssetDetails;
use crate::services::disposition_rules::ScrapRequest;
use crate::services::intake::{IntakeFlags, IntakeRow};

/// Serials that share one set of asset details
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialIntakeRequest {
    pub package_id: i32,
    pub serials: Vec<String>,
    #[serde(default)]
    pub details: AssetDetails,
    #[serde(default)]
    pub is_new_condition: bool,
    #[serde(default)]
    pub scrap: Option<ScrapRequest>,
}

impl SerialIntakeRequest {
    pub fn flags(&self) -> IntakeFlags {
        IntakeFlags {
            is_new_condition: self.is_new_condition,
            scrap: self.scrap.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIntakeRequest {
    pub package_id: i32,
    pub rows: Vec<IntakeRow>,
    #[serde(default)]
    pub is_new_condition: bool,
    #[serde(default)]
    pub scrap: Option<ScrapRequest>,
}

impl RowIntakeRequest {
    pub fn flags(&self) -> IntakeFlags {
        IntakeFlags {
            is_new_condition: self.is_new_condition,
            scrap: self.scrap.clone(),
        }
    }
}
