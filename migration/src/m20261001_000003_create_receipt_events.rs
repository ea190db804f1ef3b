//! Append-only receipt ledger. One row per physical intake of a serial.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReceiptEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReceiptEvents::ReceiptId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReceiptEvents::SerialNumber).string().not_null())
                    .col(ColumnDef::new(ReceiptEvents::PackageId).integer().not_null())
                    .col(ColumnDef::new(ReceiptEvents::Imei).string().null())
                    .col(ColumnDef::new(ReceiptEvents::Category).string_len(50).null())
                    .col(ColumnDef::new(ReceiptEvents::Make).string_len(50).null())
                    .col(ColumnDef::new(ReceiptEvents::ModelNumber).string_len(50).null())
                    .col(ColumnDef::new(ReceiptEvents::Description).text().null())
                    .col(
                        ColumnDef::new(ReceiptEvents::ReceivedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_receipt_events_package")
                            .from(ReceiptEvents::Table, ReceiptEvents::PackageId)
                            .to(Packages::Table, Packages::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // "Latest receipt per serial" lookups partition on serial_number
        manager
            .create_index(
                Index::create()
                    .name("idx_receipt_events_serial")
                    .table(ReceiptEvents::Table)
                    .col(ReceiptEvents::SerialNumber)
                    .col(ReceiptEvents::ReceiptId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_receipt_events_package")
                    .table(ReceiptEvents::Table)
                    .col(ReceiptEvents::PackageId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReceiptEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReceiptEvents {
    Table,
    ReceiptId,
    SerialNumber,
    PackageId,
    Imei,
    Category,
    Make,
    ModelNumber,
    Description,
    ReceivedAt,
}

#[derive(Iden)]
enum Packages {
    Table,
    Id,
}
