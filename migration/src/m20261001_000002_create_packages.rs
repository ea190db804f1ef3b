use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Packages::Table)
                    .if_not_exists()
                    .col(pk_auto(Packages::Id))
                    .col(string_len(Packages::TrackingNumber, 50).unique_key())
                    .col(string_len_null(Packages::FirstName, 50))
                    .col(string_len_null(Packages::LastName, 50))
                    .col(string_len_null(Packages::City, 100))
                    .col(string_len_null(Packages::State, 2))
                    .col(string_len_null(Packages::ZipCode, 10))
                    .col(date(Packages::ReceiveDate))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Packages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Packages {
    Table,
    Id,
    TrackingNumber,
    FirstName,
    LastName,
    City,
    State,
    ZipCode,
    ReceiveDate,
}
