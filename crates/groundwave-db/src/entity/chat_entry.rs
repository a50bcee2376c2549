//! chat entry entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use groundwave_types::{ChatEntry, ContactId, NewChatEntry};

use crate::Error;

/// chat entry database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chat_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub contact_id: i64,
    pub platform: String,
    pub sender: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contact::Entity",
        from = "Column::ContactId",
        to = "super::contact::Column::Id"
    )]
    Contact,
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contact.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ChatEntry {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let invalid = |e: groundwave_types::Error| {
            Error::InvalidData(format!("chat entry {}: {}", model.id, e))
        };
        Ok(ChatEntry {
            id: model.id as u64,
            contact_id: ContactId(model.contact_id as u64),
            platform: model.platform.parse().map_err(invalid)?,
            sender: model.sender.parse().map_err(invalid)?,
            message: model.message,
            sent_at: model.sent_at,
        })
    }
}

impl From<&NewChatEntry> for ActiveModel {
    fn from(entry: &NewChatEntry) -> Self {
        ActiveModel {
            id: NotSet,
            contact_id: Set(entry.contact_id.0 as i64),
            platform: Set(entry.platform.as_str().to_string()),
            sender: Set(entry.sender.as_str().to_string()),
            message: Set(entry.message.clone()),
            sent_at: Set(entry.sent_at),
        }
    }
}
