//! Inventory routes.

use super::{
    AppState,
    actor::Actor,
    extract::{Json, Path},
};
use crate::{
    core::inventory::{
        self, LowStockWarning, NewInventoryItem, Restock, StockAdjustment, StockMovement,
    },
    entities::InventoryModel,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(list).post(create))
        .route("/inventory/low-stock", get(low_stock))
        .route("/inventory/{id}/restock", post(restock))
        .route("/inventory/{id}/adjust", post(adjust))
}

async fn list(State(state): State<AppState>, actor: Actor) -> Result<Json<Vec<InventoryModel>>> {
    actor.require_staff()?;
    Ok(Json(inventory::list_inventory(&state.db).await?))
}

async fn low_stock(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<LowStockWarning>>> {
    actor.require_staff()?;
    Ok(Json(inventory::list_low_stock(&state.db).await?))
}

async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewInventoryItem>,
) -> Result<Json<InventoryModel>> {
    actor.require_admin()?;
    Ok(Json(
        inventory::create_inventory_item(&state.db, request, state.now()).await?,
    ))
}

async fn restock(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(request): Json<Restock>,
) -> Result<Json<StockMovement>> {
    actor.require_staff()?;
    Ok(Json(
        inventory::restock(&state.db, id, request, Some(actor.id), state.now()).await?,
    ))
}

async fn adjust(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(request): Json<StockAdjustment>,
) -> Result<Json<StockMovement>> {
    actor.require_staff()?;
    Ok(Json(
        inventory::adjust_stock(&state.db, id, request, Some(actor.id), state.now()).await?,
    ))
}
