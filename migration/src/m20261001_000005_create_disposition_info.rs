use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DispositionInfo::Table)
                    .if_not_exists()
                    .col(pk_auto(DispositionInfo::Id))
                    .col(integer(DispositionInfo::ReceiptId).unique_key())
                    .col(text_null(DispositionInfo::OtherDisqualification))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_disposition_info_receipt")
                            .from(DispositionInfo::Table, DispositionInfo::ReceiptId)
                            .to(ReceiptEvents::Table, ReceiptEvents::ReceiptId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DispositionInfo::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DispositionInfo {
    Table,
    Id,
    ReceiptId,
    OtherDisqualification,
}

#[derive(DeriveIden)]
enum ReceiptEvents {
    Table,
    ReceiptId,
}
