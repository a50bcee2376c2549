//! qso entity for database storage.
//!
//! the searchable fields get their own columns, the full record is kept as
//! json so exports reproduce every imported field.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use groundwave_adif::Qso;

use crate::Error;

/// qso database model.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "qsos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub call: String,
    pub timestamp: DateTime<Utc>,
    pub band: String,
    pub mode: String,
    pub country: String,
    #[sea_orm(column_type = "Text")]
    pub record: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Qso {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        serde_json::from_str(&model.record)
            .map_err(|e| Error::InvalidData(format!("qso {}: {}", model.id, e)))
    }
}

impl TryFrom<&Qso> for ActiveModel {
    type Error = Error;

    fn try_from(qso: &Qso) -> Result<Self, Self::Error> {
        let record =
            serde_json::to_string(qso).map_err(|e| Error::InvalidData(e.to_string()))?;
        Ok(ActiveModel {
            id: NotSet,
            call: Set(qso.call.clone()),
            timestamp: Set(qso.timestamp),
            band: Set(qso.band.clone()),
            mode: Set(qso.mode.clone()),
            country: Set(qso.country.clone()),
            record: Set(record),
        })
    }
}
