//! Service catalogue routes.

use super::{
    AppState,
    actor::Actor,
    extract::{Json, Path},
};
use crate::{
    core::service::{self, NewService, ServiceDetails},
    entities::ServiceModel,
    errors::Result,
};
use axum::{Router, extract::State, routing::get};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services", get(list).post(create))
        .route("/services/{id}", get(details))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<ServiceModel>>> {
    Ok(Json(service::list_active_services(&state.db).await?))
}

async fn details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ServiceDetails>> {
    Ok(Json(service::get_service_details(&state.db, id).await?))
}

async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewService>,
) -> Result<Json<ServiceDetails>> {
    actor.require_admin()?;
    Ok(Json(
        service::create_service(&state.db, request, state.now()).await?,
    ))
}
