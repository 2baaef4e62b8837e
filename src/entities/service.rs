//! Service entity - a bookable salon service.
//!
//! Each service has a fixed duration that determines appointment length, a price in cents,
//! and an ordered list of inventory requirements consumed when an appointment completes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Service database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g. "Haircut")
    pub name: String,
    pub description: Option<String>,
    /// Appointment length in minutes (at least 15)
    pub duration_minutes: i32,
    /// Price in minor currency units
    pub price_cents: i64,
    /// Inactive services cannot be booked
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::service_requirement::Entity")]
    Requirements,
    #[sea_orm(has_many = "super::appointment::Entity")]
    Appointments,
}

impl Related<super::service_requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requirements.def()
    }
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
