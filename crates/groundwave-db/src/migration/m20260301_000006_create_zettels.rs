//! create zettels and link tables migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Zettels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Zettels::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Zettels::Title).string().not_null())
                    .col(ColumnDef::new(Zettels::Body).text().not_null())
                    .col(
                        ColumnDef::new(Zettels::Access)
                            .string()
                            .not_null()
                            .default("private"),
                    )
                    .col(ColumnDef::new(Zettels::Date).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Zettels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // targets may name notes that do not exist yet, so no foreign keys here
        manager
            .create_table(
                Table::create()
                    .table(ZettelForwardLinks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ZettelForwardLinks::SourceId).string().not_null())
                    .col(ColumnDef::new(ZettelForwardLinks::TargetId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(ZettelForwardLinks::SourceId)
                            .col(ZettelForwardLinks::TargetId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ZettelBackLinks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ZettelBackLinks::TargetId).string().not_null())
                    .col(ColumnDef::new(ZettelBackLinks::SourceId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(ZettelBackLinks::TargetId)
                            .col(ZettelBackLinks::SourceId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ZettelBackLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ZettelForwardLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Zettels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Zettels {
    Table,
    Id,
    Title,
    Body,
    Access,
    Date,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ZettelForwardLinks {
    Table,
    SourceId,
    TargetId,
}

#[derive(DeriveIden)]
pub enum ZettelBackLinks {
    Table,
    TargetId,
    SourceId,
}
