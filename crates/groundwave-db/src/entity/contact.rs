//! contact entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use groundwave_types::{Contact, ContactId};

/// contact database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub emails: String,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub phones: String,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub urls: String,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub tags: String,
    pub carddav_link: Option<String>,
    pub last_auto_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chat_entry::Entity")]
    ChatEntries,
}

impl Related<super::chat_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn json(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".into())
}

impl From<Model> for Contact {
    fn from(model: Model) -> Self {
        Contact {
            id: ContactId(model.id as u64),
            name: model.name,
            emails: list(&model.emails),
            phones: list(&model.phones),
            urls: list(&model.urls),
            tags: list(&model.tags),
            carddav_link: model.carddav_link,
            last_auto_contact_at: model.last_auto_contact_at,
            created_at: model.created_at,
        }
    }
}

impl From<&Contact> for ActiveModel {
    fn from(contact: &Contact) -> Self {
        ActiveModel {
            id: if contact.id.0 == 0 {
                NotSet
            } else {
                Set(contact.id.0 as i64)
            },
            name: Set(contact.name.clone()),
            emails: Set(json(&contact.emails)),
            phones: Set(json(&contact.phones)),
            urls: Set(json(&contact.urls)),
            tags: Set(json(&contact.tags)),
            carddav_link: Set(contact.carddav_link.clone()),
            last_auto_contact_at: Set(contact.last_auto_contact_at),
            created_at: Set(contact.created_at),
        }
    }
}
