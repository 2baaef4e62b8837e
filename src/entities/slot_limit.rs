//! Slot limit entity - windows that lower the concurrent-appointment capacity.
//!
//! Any slot overlapping a limit gets capacity `min(settings capacity, max_concurrent)`.
//! Limits may overlap each other; the smallest one wins.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Slot limit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slot_limits")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[serde(skip)]
    pub settings_id: i32,
    pub starts_at: DateTimeUtc,
    pub ends_at: DateTimeUtc,
    /// Capacity ceiling inside the window (at least 1)
    pub max_concurrent: i32,
    pub reason: Option<String>,
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
