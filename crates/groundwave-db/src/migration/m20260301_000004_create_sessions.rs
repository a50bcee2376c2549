//! create sessions table migration

use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::UserId).big_integer())
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::AbsoluteExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::LastActivityAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::Device)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Sessions::Ip).string().not_null().default(""))
                    .col(ColumnDef::new(Sessions::SensitiveExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Sessions::BreakGlassProfileIds)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Sessions::BreakGlassExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Sessions::Ceremony).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sessions_user")
                            .from(Sessions::Table, Sessions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // index on user_id for the security page
        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_user_id")
                    .table(Sessions::Table)
                    .col(Sessions::UserId)
                    .to_owned(),
            )
            .await?;

        // index on expiry for the sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_absolute_expires_at")
                    .table(Sessions::Table)
                    .col(Sessions::AbsoluteExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Sessions {
    Table,
    Id,
    UserId,
    CreatedAt,
    AbsoluteExpiresAt,
    LastActivityAt,
    Device,
    Ip,
    SensitiveExpiresAt,
    BreakGlassProfileIds,
    BreakGlassExpiresAt,
    Ceremony,
}
