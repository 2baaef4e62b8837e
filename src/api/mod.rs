//! HTTP surface - JSON routes over the core operations.
//!
//! Handlers stay thin: extract, check the actor's role, call into [`crate::core`], wrap the
//! result. Errors convert to responses through [`Error`](crate::errors::Error)'s
//! `IntoResponse` impl.

pub mod actor;
pub mod appointments;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod payments;
pub mod services;
pub mod settings;

use crate::config::BookingPolicy;
use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Source of the current instant
pub type Clock = fn() -> DateTime<Utc>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub policy: BookingPolicy,
    clock: Clock,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, policy: BookingPolicy) -> Self {
        Self {
            db,
            policy,
            clock: Utc::now,
        }
    }

    /// Replaces the wall clock, e.g. with a fixed instant.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(appointments::router())
        .merge(settings::router())
        .merge(payments::router())
        .merge(services::router())
        .merge(inventory::router())
}

/// Build the fully configured application.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
