//! Demo payment routes.

use super::{
    AppState,
    actor::Actor,
    extract::{Json, Path},
};
use crate::{
    core::payment::{self, DemoPaymentUpdate, NewDemoPayment, PaymentOutcome},
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::{post, put},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/demo", post(open))
        .route("/payments/demo/{id}", put(settle))
}

async fn open(
    State(state): State<AppState>,
    Json(request): Json<NewDemoPayment>,
) -> Result<Json<PaymentOutcome>> {
    let outcome = payment::create_demo_payment(
        &state.db,
        request.appointment_id,
        request.method,
        state.now(),
    )
    .await?;
    Ok(Json(outcome))
}

async fn settle(
    State(state): State<AppState>,
    actor: Option<Actor>,
    Path(id): Path<i64>,
    Json(update): Json<DemoPaymentUpdate>,
) -> Result<Json<PaymentOutcome>> {
    let outcome = payment::update_demo_payment(
        &state.db,
        id,
        update.status,
        actor.map(|a| a.id),
        state.now(),
    )
    .await?;
    Ok(Json(outcome))
}
