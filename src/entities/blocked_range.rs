//! Blocked range entity - salon-wide blackout windows.
//!
//! Ranges are immutable once created: they are only ever inserted or deleted.
//! No two ranges of the same settings row overlap.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Blocked range database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blocked_ranges")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning settings row
    #[serde(skip)]
    pub settings_id: i32,
    /// Inclusive start of the blackout
    pub starts_at: DateTimeUtc,
    /// Exclusive end of the blackout
    pub ends_at: DateTimeUtc,
    /// Optional human-readable reason (e.g. "Holiday")
    pub reason: Option<String>,
    /// Admin who created the range
    pub created_by_id: Option<i64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::settings::Entity",
        from = "Column::SettingsId",
        to = "super::settings::Column::Id"
    )]
    Settings,
}

impl Related<super::settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
