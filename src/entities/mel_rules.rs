//! `SeaORM` Entity for mel_rules table (reference data)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "mel_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub model_number: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub action: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub special_notes: Option<String>,
    pub manufacturer: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
