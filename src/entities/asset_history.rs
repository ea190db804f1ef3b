//! `SeaORM` Entity for asset_history table
//!
//! Read-only autofill source. Never written by the intake path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "asset_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub serial_number: String,
    pub make: Option<String>,
    pub model_number: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub category: Option<String>,
    pub imei: Option<String>,
    pub capacity: Option<String>,
    pub everon_serial: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
