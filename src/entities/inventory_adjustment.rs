//! Inventory adjustment entity - the stock movement ledger.
//!
//! Rows tied to an appointment come from completing it; restocks and manual corrections
//! carry no appointment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reason recorded for consumption on completion
pub const REASON_APPOINTMENT_COMPLETED: &str = "APPOINTMENT_COMPLETED";
pub const REASON_RESTOCK: &str = "RESTOCK";
pub const REASON_MANUAL_ADJUSTMENT: &str = "MANUAL_ADJUSTMENT";

/// Inventory adjustment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_adjustments")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub appointment_id: Option<i64>,
    pub inventory_id: i64,
    /// Signed stock delta; negative is consumption
    pub change: i64,
    pub reason: String,
    pub notes: Option<String>,
    /// Staff member behind a restock or correction
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
    #[sea_orm(
        belongs_to = "super::inventory::Entity",
        from = "Column::InventoryId",
        to = "super::inventory::Column::Id"
    )]
    Inventory,
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointment.def()
    }
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
