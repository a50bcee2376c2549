//! invite entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use groundwave_types::{Invite, InviteId, InviteToken, UserId};

use crate::Error;

/// invite database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "invites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub token: String,
    pub created_by: i64,
    pub target_role: String,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub consumed_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Invite {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Invite {
            id: InviteId(model.id as u64),
            token: InviteToken::new(model.token)
                .map_err(|e| Error::InvalidData(format!("invite {}: {}", model.id, e)))?,
            created_by: UserId(model.created_by as u64),
            target_role: model
                .target_role
                .parse()
                .map_err(|e| Error::InvalidData(format!("invite {}: {}", model.id, e)))?,
            created_at: model.created_at,
            consumed_at: model.consumed_at,
            consumed_by: model.consumed_by.map(|id| UserId(id as u64)),
        })
    }
}

impl From<&Invite> for ActiveModel {
    fn from(invite: &Invite) -> Self {
        ActiveModel {
            id: if invite.id.0 == 0 {
                NotSet
            } else {
                Set(invite.id.0 as i64)
            },
            token: Set(invite.token.as_str().to_string()),
            created_by: Set(invite.created_by.0 as i64),
            target_role: Set(invite.target_role.as_str().to_string()),
            created_at: Set(invite.created_at),
            consumed_at: Set(invite.consumed_at),
            consumed_by: Set(invite.consumed_by.map(|id| id.0 as i64)),
        }
    }
}
