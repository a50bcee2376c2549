//! browser session entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use groundwave_types::UserId;

use crate::SessionRecord;

/// session database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// 64 hex chars
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub absolute_expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub device: String,
    pub ip: String,
    pub sensitive_expires_at: Option<DateTime<Utc>>,
    /// json-serialized vec<u64>
    #[sea_orm(column_type = "Text")]
    pub break_glass_profile_ids: String,
    pub break_glass_expires_at: Option<DateTime<Utc>>,
    /// pending webauthn ceremony, json
    #[sea_orm(column_type = "Text", nullable)]
    pub ceremony: Option<String>,
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

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SessionRecord {
    fn from(model: Model) -> Self {
        SessionRecord {
            id: model.id,
            user_id: model.user_id.map(|id| UserId(id as u64)),
            created_at: model.created_at,
            absolute_expires_at: model.absolute_expires_at,
            last_activity_at: model.last_activity_at,
            device: model.device,
            ip: model.ip,
            sensitive_expires_at: model.sensitive_expires_at,
            break_glass_profile_ids: serde_json::from_str(&model.break_glass_profile_ids)
                .unwrap_or_default(),
            break_glass_expires_at: model.break_glass_expires_at,
            ceremony: model.ceremony,
        }
    }
}

impl From<&SessionRecord> for ActiveModel {
    fn from(session: &SessionRecord) -> Self {
        ActiveModel {
            id: Set(session.id.clone()),
            user_id: Set(session.user_id.map(|id| id.0 as i64)),
            created_at: Set(session.created_at),
            absolute_expires_at: Set(session.absolute_expires_at),
            last_activity_at: Set(session.last_activity_at),
            device: Set(session.device.clone()),
            ip: Set(session.ip.clone()),
            sensitive_expires_at: Set(session.sensitive_expires_at),
            break_glass_profile_ids: Set(serde_json::to_string(&session.break_glass_profile_ids)
                .unwrap_or_else(|_| "[]".into())),
            break_glass_expires_at: Set(session.break_glass_expires_at),
            ceremony: Set(session.ceremony.clone()),
        }
    }
}
