//! the single linked whatsapp device.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// whatsapp device database model. there is at most one row, id 1.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "whatsapp_devices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub jid: Option<String>,
    pub initialized: bool,
    /// opaque credential blob from the protocol bridge
    #[sea_orm(column_type = "Text", nullable)]
    pub session: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
