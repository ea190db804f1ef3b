//! Current status per receipt event (1:1), with a structured box location and
//! an optimistic-concurrency version counter.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeviceStatus::Table)
                    .if_not_exists()
                    .col(pk_auto(DeviceStatus::Id))
                    .col(integer(DeviceStatus::ReceiptId).unique_key())
                    .col(string(DeviceStatus::Status))
                    .col(string(DeviceStatus::SubStatus))
                    .col(timestamp(DeviceStatus::LastUpdate).default(Expr::current_timestamp()))
                    .col(text_null(DeviceStatus::Note))
                    .col(string_len_null(DeviceStatus::BoxId, 64))
                    .col(integer(DeviceStatus::Version).default(1))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_device_status_receipt")
                            .from(DeviceStatus::Table, DeviceStatus::ReceiptId)
                            .to(ReceiptEvents::Table, ReceiptEvents::ReceiptId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_status_status_update")
                    .table(DeviceStatus::Table)
                    .col(DeviceStatus::Status)
                    .col(DeviceStatus::LastUpdate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_status_last_update")
                    .table(DeviceStatus::Table)
                    .col(DeviceStatus::LastUpdate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_status_box_id")
                    .table(DeviceStatus::Table)
                    .col(DeviceStatus::BoxId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceStatus::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DeviceStatus {
    Table,
    Id,
    ReceiptId,
    Status,
    SubStatus,
    LastUpdate,
    Note,
    BoxId,
    Version,
}

#[derive(DeriveIden)]
enum ReceiptEvents {
    Table,
    ReceiptId,
}
