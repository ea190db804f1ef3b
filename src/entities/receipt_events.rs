//! `SeaORM` Entity for receipt_events table
//!
//! Append-only. The current receipt for a serial is the row with the highest
//! `receipt_id`; rows are never updated in place.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "receipt_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub receipt_id: i32,
    pub serial_number: String,
    pub package_id: i32,
    pub imei: Option<String>,
    pub category: Option<String>,
    pub make: Option<String>,
    pub model_number: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub received_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::packages::Entity",
        from = "Column::PackageId",
        to = "super::packages::Column::Id"
    )]
    Packages,
    #[sea_orm(has_one = "super::device_status::Entity")]
    DeviceStatus,
}

impl Related<super::packages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Packages.def()
    }
}

impl Related<super::device_status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceStatus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
