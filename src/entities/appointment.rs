//! Appointment entity - a booked occurrence of a service.
//!
//! Appointments start `PENDING`, move freely among the active statuses and end in one of the
//! terminal statuses, after which they are immutable. Only active appointments count toward
//! slot capacity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that occupy capacity
    pub const ACTIVE: [Self; 3] = [Self::Pending, Self::Confirmed, Self::InProgress];

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether a status write from `self` to `target` is legal.
    ///
    /// The table is permissive among active statuses: any active status may move to any
    /// other, backwards included (`CONFIRMED` to `PENDING`, `IN_PROGRESS` to `CONFIRMED`).
    /// Terminal statuses never move, so `false` always means the appointment is finalized.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.is_active() && self != target
    }
}

/// Appointment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub status: AppointmentStatus,
    pub scheduled_start: DateTimeUtc,
    /// `scheduled_start` plus the service duration
    pub scheduled_end: DateTimeUtc,
    pub service_id: i64,
    /// Linked customer account
    pub customer_id: Option<i64>,
    /// Contact snapshot taken at booking time
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id"
    )]
    Service,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::appointment_event::Entity")]
    Events,
    #[sea_orm(has_many = "super::inventory_adjustment::Entity")]
    Adjustments,
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::appointment_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl Related<super::inventory_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Adjustments.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
