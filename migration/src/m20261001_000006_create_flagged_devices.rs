use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Keyed by serial, independent of any receipt
        manager
            .create_table(
                Table::create()
                    .table(FlaggedDevices::Table)
                    .if_not_exists()
                    .col(string(FlaggedDevices::SerialNumber).primary_key())
                    .col(text_null(FlaggedDevices::FlagReason))
                    .col(timestamp(FlaggedDevices::FlaggedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FlaggedDevices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FlaggedDevices {
    Table,
    SerialNumber,
    FlagReason,
    FlaggedAt,
}
