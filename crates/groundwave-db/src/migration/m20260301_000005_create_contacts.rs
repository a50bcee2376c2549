//! create contacts and chat_entries tables migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contacts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contacts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Contacts::Emails)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Phones)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Urls)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Tags)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Contacts::CarddavLink).string())
                    .col(ColumnDef::new(Contacts::LastAutoContactAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Contacts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChatEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChatEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChatEntries::ContactId).big_integer().not_null())
                    .col(ColumnDef::new(ChatEntries::Platform).string().not_null())
                    .col(ColumnDef::new(ChatEntries::Sender).string().not_null())
                    .col(ColumnDef::new(ChatEntries::Message).text().not_null())
                    .col(
                        ColumnDef::new(ChatEntries::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_entries_contact")
                            .from(ChatEntries::Table, ChatEntries::ContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chat_entries_contact_id")
                    .table(ChatEntries::Table)
                    .col(ChatEntries::ContactId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChatEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Contacts {
    Table,
    Id,
    Name,
    Emails,
    Phones,
    Urls,
    Tags,
    CarddavLink,
    LastAutoContactAt,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum ChatEntries {
    Table,
    Id,
    ContactId,
    Platform,
    Sender,
    Message,
    SentAt,
}
