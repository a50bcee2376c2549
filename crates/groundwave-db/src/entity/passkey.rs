//! passkey entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use groundwave_types::UserId;

use crate::PasskeyRecord;

/// passkey database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "passkeys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    /// base64url credential id
    #[sea_orm(unique)]
    pub credential_id: String,
    /// serialized webauthn credential, public key included
    #[sea_orm(column_type = "Text")]
    pub credential: String,
    pub sign_count: i64,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub transports: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PasskeyRecord {
    fn from(model: Model) -> Self {
        PasskeyRecord {
            id: model.id as u64,
            user_id: UserId(model.user_id as u64),
            credential_id: model.credential_id,
            credential: model.credential,
            sign_count: model.sign_count as u32,
            transports: serde_json::from_str(&model.transports).unwrap_or_default(),
            name: model.name,
            created_at: model.created_at,
            last_used_at: model.last_used_at,
        }
    }
}

impl From<&PasskeyRecord> for ActiveModel {
    fn from(key: &PasskeyRecord) -> Self {
        ActiveModel {
            id: if key.id == 0 { NotSet } else { Set(key.id as i64) },
            user_id: Set(key.user_id.0 as i64),
            credential_id: Set(key.credential_id.clone()),
            credential: Set(key.credential.clone()),
            sign_count: Set(i64::from(key.sign_count)),
            transports: Set(serde_json::to_string(&key.transports).unwrap_or_else(|_| "[]".into())),
            name: Set(key.name.clone()),
            created_at: Set(key.created_at),
            last_used_at: Set(key.last_used_at),
        }
    }
}
