//! Inventory entity - stocked consumables (shampoo, dye, towels, ...).
//!
//! `stock` never goes below zero; it is only decremented through a conditional update
//! during appointment completion.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Units on hand
    pub stock: i64,
    /// Low-stock alert level; stock at or below it triggers a warning
    pub threshold: i64,
    /// Unit of measure (e.g. "ml", "pcs")
    pub unit: String,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_adjustment::Entity")]
    Adjustments,
}

impl Related<super::inventory_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Adjustments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
