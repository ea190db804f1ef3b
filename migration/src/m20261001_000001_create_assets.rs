//! Asset master table plus the read-only history table used as an autofill fallback

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Assets::Table)
                    .if_not_exists()
                    .col(pk_auto(Assets::Id))
                    .col(string(Assets::SerialNumber).unique_key())
                    .col(string_null(Assets::Make))
                    .col(string_null(Assets::ModelNumber))
                    .col(text_null(Assets::Description))
                    .col(string_null(Assets::Category))
                    .col(string_null(Assets::Imei).unique_key())
                    .col(string_null(Assets::Capacity))
                    .col(boolean(Assets::EveronSerial).default(false))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AssetHistory::Table)
                    .if_not_exists()
                    .col(string(AssetHistory::SerialNumber).primary_key())
                    .col(string_null(AssetHistory::Make))
                    .col(string_null(AssetHistory::ModelNumber))
                    .col(text_null(AssetHistory::Description))
                    .col(string_null(AssetHistory::Category))
                    .col(string_null(AssetHistory::Imei))
                    .col(string_null(AssetHistory::Capacity))
                    .col(boolean(AssetHistory::EveronSerial).default(false))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AssetHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Assets {
    Table,
    Id,
    SerialNumber,
    Make,
    ModelNumber,
    Description,
    Category,
    Imei,
    Capacity,
    EveronSerial,
}

#[derive(DeriveIden)]
enum AssetHistory {
    Table,
    SerialNumber,
    Make,
    ModelNumber,
    Description,
    Category,
    Imei,
    Capacity,
    EveronSerial,
}
