//! Inventory catalogue - stocked consumables, stock movements and low-stock reporting.
//!
//! Every movement made here (restock or manual correction) writes one adjustment row in the
//! same transaction as the stock change. Consumption by completed appointments is settled in
//! [`super::appointment`].

use crate::{
    entities::{Inventory, inventory, inventory_adjustment},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::whole_seconds;

const DEFAULT_UNIT: &str = "pcs";

/// Request to add an inventory item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryItem {
    pub name: String,
    pub stock: i64,
    #[serde(default)]
    pub threshold: i64,
    pub unit: Option<String>,
}

/// An item whose stock is at or below its alert threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockWarning {
    pub inventory_id: i64,
    pub name: String,
    pub stock: i64,
    pub threshold: i64,
    pub unit: String,
}

impl From<&inventory::Model> for LowStockWarning {
    fn from(item: &inventory::Model) -> Self {
        Self {
            inventory_id: item.id,
            name: item.name.clone(),
            stock: item.stock,
            threshold: item.threshold,
            unit: item.unit.clone(),
        }
    }
}

/// Stock received from a supplier.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restock {
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Manual correction; positive adds, negative removes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub change: i64,
    pub reason: Option<String>,
}

/// An item after a stock movement, with the ledger row recording it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub item: inventory::Model,
    pub adjustment: inventory_adjustment::Model,
    pub low_stock: bool,
}

#[must_use]
pub const fn is_low_stock(item: &inventory::Model) -> bool {
    item.stock <= item.threshold
}

/// Adds an inventory item.
///
/// # Errors
/// Returns an error if the name is blank, stock or threshold is negative, or the insert fails.
pub async fn create_inventory_item(
    db: &DatabaseConnection,
    request: NewInventoryItem,
    now: DateTime<Utc>,
) -> Result<inventory::Model> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("Inventory name is required"));
    }
    if request.stock < 0 {
        return Err(Error::validation("Stock cannot be negative"));
    }
    if request.threshold < 0 {
        return Err(Error::validation("Threshold cannot be negative"));
    }

    let unit = super::clean_text(request.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string());
    let item = inventory::ActiveModel {
        name: Set(name),
        stock: Set(request.stock),
        threshold: Set(request.threshold),
        unit: Set(unit),
        is_active: Set(true),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(id = item.id, name = %item.name, stock = item.stock, "Inventory item created");
    Ok(item)
}

pub async fn get_inventory_item<C>(db: &C, id: i64) -> Result<inventory::Model>
where
    C: ConnectionTrait,
{
    Inventory::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Inventory item", id))
}

/// Changes stock by `change` and records it, refusing to go below zero.
///
/// The decrement is a single conditional update, so it cannot race a concurrent completion
/// into negative stock.
async fn apply_stock_change(
    db: &DatabaseConnection,
    id: i64,
    change: i64,
    reason: &str,
    notes: Option<String>,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<StockMovement> {
    let txn = db.begin().await?;

    let result = Inventory::update_many()
        .col_expr(
            inventory::Column::Stock,
            Expr::col(inventory::Column::Stock).add(change),
        )
        .filter(inventory::Column::Id.eq(id))
        .filter(Expr::expr(Expr::col(inventory::Column::Stock).add(change)).gte(0))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        let item = get_inventory_item(&txn, id).await?;
        return Err(Error::validation(format!(
            "Cannot adjust {}: would result in negative stock ({})",
            item.name,
            item.stock.saturating_add(change)
        )));
    }

    let adjustment = inventory_adjustment::ActiveModel {
        appointment_id: Set(None),
        inventory_id: Set(id),
        change: Set(change),
        reason: Set(reason.to_string()),
        notes: Set(notes),
        created_by_id: Set(actor_id),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let item = get_inventory_item(&txn, id).await?;
    txn.commit().await?;

    info!(id, change, stock = item.stock, reason, "Stock adjusted");
    let low_stock = is_low_stock(&item);
    if low_stock {
        warn!(id, name = %item.name, stock = item.stock, threshold = item.threshold, "Inventory low on stock");
    }

    Ok(StockMovement {
        item,
        adjustment,
        low_stock,
    })
}

/// Adds received stock to an item.
///
/// # Errors
/// Returns an error if the quantity is not positive, the item does not exist, or the
/// database operation fails.
#[instrument(skip(db, request))]
pub async fn restock(
    db: &DatabaseConnection,
    id: i64,
    request: Restock,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<StockMovement> {
    if request.quantity < 1 {
        return Err(Error::validation("Restock quantity must be at least 1"));
    }
    let notes = super::clean_text(request.notes);
    apply_stock_change(
        db,
        id,
        request.quantity,
        inventory_adjustment::REASON_RESTOCK,
        notes,
        actor_id,
        now,
    )
    .await
}

/// Corrects an item's stock by a signed amount.
///
/// # Errors
/// Returns an error if the change is zero, the result would be negative, the item does not
/// exist, or the database operation fails.
#[instrument(skip(db, request))]
pub async fn adjust_stock(
    db: &DatabaseConnection,
    id: i64,
    request: StockAdjustment,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<StockMovement> {
    if request.change == 0 {
        return Err(Error::validation("No adjustment made (adjustment is 0)"));
    }
    let reason = super::clean_text(request.reason);
    apply_stock_change(
        db,
        id,
        request.change,
        inventory_adjustment::REASON_MANUAL_ADJUSTMENT,
        reason,
        actor_id,
        now,
    )
    .await
}

/// Lists every inventory item by name.
pub async fn list_inventory(db: &DatabaseConnection) -> Result<Vec<inventory::Model>> {
    Inventory::find()
        .order_by_asc(inventory::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists active items whose stock is at or below their threshold, lowest stock first.
pub async fn list_low_stock(db: &DatabaseConnection) -> Result<Vec<LowStockWarning>> {
    let items = Inventory::find()
        .filter(inventory::Column::IsActive.eq(true))
        .filter(Expr::col(inventory::Column::Stock).lte(Expr::col(inventory::Column::Threshold)))
        .order_by_asc(inventory::Column::Stock)
        .order_by_asc(inventory::Column::Name)
        .all(db)
        .await?;

    Ok(items.iter().map(LowStockWarning::from).collect())
}
