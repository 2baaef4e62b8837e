//! Appointment routes: availability, booking, listing and status changes.

use super::{
    AppState,
    actor::Actor,
    extract::{Json, Path, Query},
};
use crate::{
    core::{
        appointment::{self, AppointmentDetails, AppointmentFilter, AppointmentListItem, StatusUpdateOutcome},
        availability::{self, Availability},
        booking::{self, BookingOutcome, BookingRequest},
    },
    entities::AppointmentStatus,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub service_id: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments/available", get(available_slots))
        .route("/appointments", get(list).post(create))
        .route("/appointments/{id}", get(details))
        .route("/appointments/{id}/status", put(change_status))
        .route("/appointments/{id}/cancel", post(cancel))
}

async fn available_slots(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>> {
    let result = availability::get_availability(
        &state.db,
        &state.policy,
        query.service_id,
        query.date,
        state.now(),
    )
    .await?;
    Ok(Json(result))
}

async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Vec<AppointmentListItem>>> {
    actor.require_staff()?;
    Ok(Json(appointment::list_appointments(&state.db, filter).await?))
}

async fn create(
    State(state): State<AppState>,
    actor: Option<Actor>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingOutcome>)> {
    let outcome = booking::create_booking(
        &state.db,
        &state.policy,
        request,
        actor.map(|a| a.id),
        state.now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn details(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<AppointmentDetails>> {
    actor.require_staff()?;
    Ok(Json(appointment::get_appointment_details(&state.db, id).await?))
}

async fn change_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<StatusUpdateOutcome>> {
    actor.require_staff()?;
    let outcome = appointment::update_status(
        &state.db,
        id,
        change.status,
        change.notes,
        Some(actor.id),
        state.now(),
    )
    .await?;
    Ok(Json(outcome))
}

async fn cancel(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<StatusUpdateOutcome>> {
    let outcome =
        appointment::cancel_appointment(&state.db, id, actor.id, actor.role, None, state.now())
            .await?;
    Ok(Json(outcome))
}
