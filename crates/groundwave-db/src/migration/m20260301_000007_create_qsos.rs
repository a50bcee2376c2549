//! create qsos table migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Qsos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Qsos::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Qsos::Call).string().not_null())
                    .col(
                        ColumnDef::new(Qsos::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Qsos::Band).string().not_null().default(""))
                    .col(ColumnDef::new(Qsos::Mode).string().not_null().default(""))
                    .col(ColumnDef::new(Qsos::Country).string().not_null().default(""))
                    .col(ColumnDef::new(Qsos::Record).text().not_null())
                    .to_owned(),
            )
            .await?;

        // one row per contact, re-imports are no-ops
        manager
            .create_index(
                Index::create()
                    .name("idx_qsos_call_timestamp")
                    .table(Qsos::Table)
                    .col(Qsos::Call)
                    .col(Qsos::Timestamp)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Qsos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Qsos {
    Table,
    Id,
    Call,
    Timestamp,
    Band,
    Mode,
    Country,
    Record,
}
