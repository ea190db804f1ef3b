//! `SeaORM` Entity for device_status table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "device_status")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub receipt_id: i32,
    pub status: String,
    pub sub_status: String,
    pub last_update: DateTime,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    pub box_id: Option<String>,
    /// Bumped on every mutation; updates are conditional on the value read.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::receipt_events::Entity",
        from = "Column::ReceiptId",
        to = "super::receipt_events::Column::ReceiptId"
    )]
    ReceiptEvents,
}

impl Related<super::receipt_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
