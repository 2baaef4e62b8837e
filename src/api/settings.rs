//! Settings routes: capacity and window, blocked ranges, slot limits.

use super::{
    AppState,
    actor::Actor,
    extract::{Json, Path, Query},
};
use crate::{
    core::{
        blocked_range::{self, NewBlockedRange, RangeFilter},
        settings::{self, SettingsUpdate},
        slot_limit::{self, NewSlotLimit},
    },
    entities::{BlockedRangeModel, SettingsModel, SlotLimitModel},
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(current).put(update))
        .route("/settings/blocked", get(list_blocked).post(create_blocked))
        .route("/settings/blocked/{id}", delete(delete_blocked))
        .route("/settings/slot-limits", get(list_limits).post(create_limit))
        .route("/settings/slot-limits/{id}", delete(delete_limit))
}

async fn current(State(state): State<AppState>, actor: Actor) -> Result<Json<SettingsModel>> {
    actor.require_staff()?;
    Ok(Json(
        settings::get_or_create(&state.db, &state.policy, state.now()).await?,
    ))
}

async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsModel>> {
    actor.require_admin()?;
    Ok(Json(
        settings::update_settings(&state.db, &state.policy, update, state.now()).await?,
    ))
}

async fn list_blocked(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<RangeFilter>,
) -> Result<Json<Vec<BlockedRangeModel>>> {
    actor.require_staff()?;
    Ok(Json(
        blocked_range::list_blocked_ranges(&state.db, filter).await?,
    ))
}

async fn create_blocked(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewBlockedRange>,
) -> Result<Json<BlockedRangeModel>> {
    actor.require_admin()?;
    let created = blocked_range::create_blocked_range(
        &state.db,
        &state.policy,
        request,
        Some(actor.id),
        state.now(),
    )
    .await?;
    Ok(Json(created))
}

async fn delete_blocked(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    actor.require_admin()?;
    blocked_range::delete_blocked_range(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_limits(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<RangeFilter>,
) -> Result<Json<Vec<SlotLimitModel>>> {
    actor.require_staff()?;
    Ok(Json(slot_limit::list_slot_limits(&state.db, filter).await?))
}

async fn create_limit(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewSlotLimit>,
) -> Result<Json<SlotLimitModel>> {
    actor.require_admin()?;
    Ok(Json(
        slot_limit::create_slot_limit(&state.db, &state.policy, request, state.now()).await?,
    ))
}

async fn delete_limit(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    actor.require_admin()?;
    slot_limit::delete_slot_limit(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
