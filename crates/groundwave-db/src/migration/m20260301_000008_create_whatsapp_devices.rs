//! create whatsapp_devices table migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WhatsappDevices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WhatsappDevices::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WhatsappDevices::Jid).string())
                    .col(
                        ColumnDef::new(WhatsappDevices::Initialized)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WhatsappDevices::Session).text())
                    .col(
                        ColumnDef::new(WhatsappDevices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WhatsappDevices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum WhatsappDevices {
    Table,
    Id,
    Jid,
    Initialized,
    Session,
    UpdatedAt,
}
