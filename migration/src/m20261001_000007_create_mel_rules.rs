use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MelRules::Table)
                    .if_not_exists()
                    .col(pk_auto(MelRules::Id))
                    .col(string_null(MelRules::ModelNumber))
                    .col(text_null(MelRules::Description))
                    .col(string(MelRules::Action))
                    .col(text_null(MelRules::SpecialNotes))
                    .col(string_null(MelRules::Manufacturer))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mel_rules_model_number")
                    .table(MelRules::Table)
                    .col(MelRules::ModelNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MelRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MelRules {
    Table,
    Id,
    ModelNumber,
    Description,
    Action,
    SpecialNotes,
    Manufacturer,
}
