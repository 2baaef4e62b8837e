//! Settings entity - the singleton booking configuration row.
//!
//! Exactly one row exists (id = 1), created lazily on first access. `booking_revision` is bumped
//! at the start of every transaction that reads before it writes, which takes the write lock
//! that serializes capacity checks, status changes and stock movements.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed primary key of the singleton row
pub const SETTINGS_ID: i32 = 1;

/// Settings database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settings")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Always [`SETTINGS_ID`]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// Maximum overlapping active appointments per slot
    pub max_concurrent_appointments: i32,
    /// How many days ahead customers may book
    pub booking_window_days: i32,
    /// Incremented by every write-locking transaction
    #[serde(skip)]
    pub booking_revision: i64,
    /// When the configuration was last modified
    pub updated_at: DateTimeUtc,
}

/// Settings own the blackout and capacity-override windows
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One settings row has many blocked ranges
    #[sea_orm(has_many = "super::blocked_range::Entity")]
    BlockedRanges,
    /// One settings row has many slot limits
    #[sea_orm(has_many = "super::slot_limit::Entity")]
    SlotLimits,
}

impl Related<super::blocked_range::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BlockedRanges.def()
    }
}

impl Related<super::slot_limit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SlotLimits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
