//! zettel entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use groundwave_org::Access;

use crate::ZettelRecord;

/// zettel database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "zettels")]
pub struct Model {
    /// the note's `:ID:` uuid
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub access: String,
    pub date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ZettelRecord {
    fn from(model: Model) -> Self {
        ZettelRecord {
            id: model.id,
            title: model.title,
            body: model.body,
            access: Access::from_str_lossy(&model.access),
            date: model.date,
            updated_at: model.updated_at,
        }
    }
}

impl From<&ZettelRecord> for ActiveModel {
    fn from(zettel: &ZettelRecord) -> Self {
        ActiveModel {
            id: Set(zettel.id.clone()),
            title: Set(zettel.title.clone()),
            body: Set(zettel.body.clone()),
            access: Set(zettel.access.as_str().to_string()),
            date: Set(zettel.date),
            updated_at: Set(zettel.updated_at),
        }
    }
}
