//! Appointment event entity - the immutable audit trail of an appointment.
//!
//! One row per creation and per effective status change; events are ordered by id.

use super::appointment::AppointmentStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Appointment event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointment_events")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub appointment_id: i64,
    /// Status the appointment had after this event
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    /// Acting user (staff/admin) or the customer for self-service actions
    pub created_by_id: Option<i64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::appointment::Entity",
        from = "Column::AppointmentId",
        to = "super::appointment::Column::Id"
    )]
    Appointment,
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
