//! database migrations for groundwave.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_invites;
mod m20260301_000003_create_passkeys;
mod m20260301_000004_create_sessions;
mod m20260301_000005_create_contacts;
mod m20260301_000006_create_zettels;
mod m20260301_000007_create_qsos;
mod m20260301_000008_create_whatsapp_devices;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users::Migration),
            Box::new(m20260301_000002_create_invites::Migration),
            Box::new(m20260301_000003_create_passkeys::Migration),
            Box::new(m20260301_000004_create_sessions::Migration),
            Box::new(m20260301_000005_create_contacts::Migration),
            Box::new(m20260301_000006_create_zettels::Migration),
            Box::new(m20260301_000007_create_qsos::Migration),
            Box::new(m20260301_000008_create_whatsapp_devices::Migration),
        ]
    }
}
