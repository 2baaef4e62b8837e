//! Shared test utilities for `SalonBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.
//!
//! Tests run on a fixed clock: "now" is 2030-01-14 08:00 UTC and the default booking day is
//! the following day, in a salon that keeps UTC.

#![allow(clippy::unwrap_used)]

use crate::{
    config::BookingPolicy,
    core::{
        booking::{self, BookingOutcome, BookingRequest, CustomerContact},
        inventory::{self, NewInventoryItem},
        service::{self, NewService, RequirementInput},
    },
    entities,
    errors::Result,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool holds a single connection: every connection to `sqlite::memory:` is its own
/// database, and one connection also means concurrent tasks queue for it like they would
/// for the write lock of a file database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database behind a pool of `connections` connections.
///
/// Unlike [`setup_test_db`], concurrent tasks really hold separate connections here and
/// contend for the database write lock. Keep the returned [`TempDir`] alive for as long as
/// the database is used.
pub async fn setup_shared_test_db(connections: u32) -> Result<(DatabaseConnection, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("salon_buddy.sqlite").display()
    );

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(connections)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Booking policy used by tests: capacity 1, 30 day window, salon on UTC.
pub fn test_policy() -> BookingPolicy {
    BookingPolicy::new(1, 30, 0).unwrap()
}

/// The fixed "now" of every test.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 14, 8, 0, 0).unwrap()
}

/// The default booking day, one day after [`fixed_now`].
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()
}

/// An instant on [`test_date`] at `hour:minute` salon time.
pub fn test_day_at(hour: u32, minute: u32) -> DateTime<Utc> {
    test_date().and_hms_opt(hour, minute, 0).unwrap().and_utc()
}

/// Creates an active service without inventory requirements.
///
/// # Defaults
/// * price: 25000 cents
pub async fn create_test_service(
    db: &DatabaseConnection,
    name: &str,
    duration_minutes: i32,
) -> Result<entities::service::Model> {
    create_service_with_requirements(db, name, duration_minutes, vec![]).await
}

/// Creates an active service consuming `requirements` as `(inventory_id, quantity)` pairs.
pub async fn create_service_with_requirements(
    db: &DatabaseConnection,
    name: &str,
    duration_minutes: i32,
    requirements: Vec<(i64, i64)>,
) -> Result<entities::service::Model> {
    let details = service::create_service(
        db,
        NewService {
            name: name.to_string(),
            description: None,
            duration_minutes,
            price_cents: 25_000,
            requirements: requirements
                .into_iter()
                .map(|(inventory_id, quantity)| RequirementInput {
                    inventory_id,
                    quantity,
                })
                .collect(),
        },
        fixed_now(),
    )
    .await?;
    Ok(details.service)
}

/// Creates an inventory item measured in "ml".
pub async fn create_test_inventory(
    db: &DatabaseConnection,
    name: &str,
    stock: i64,
    threshold: i64,
) -> Result<entities::inventory::Model> {
    inventory::create_inventory_item(
        db,
        NewInventoryItem {
            name: name.to_string(),
            stock,
            threshold,
            unit: Some("ml".to_string()),
        },
        fixed_now(),
    )
    .await
}

/// Contact details of a test customer.
pub fn test_contact(email: &str) -> CustomerContact {
    CustomerContact {
        name: "Maria Santos".to_string(),
        email: email.to_string(),
        phone: Some("+63 917 555 0101".to_string()),
    }
}

/// Books `service_id` at `start` for a guest with the given email.
pub async fn book_test_appointment(
    db: &DatabaseConnection,
    service_id: i64,
    start: DateTime<Utc>,
    email: &str,
) -> Result<BookingOutcome> {
    booking::create_booking(
        db,
        &test_policy(),
        BookingRequest {
            service_id,
            scheduled_start: start,
            customer: test_contact(email),
            notes: None,
            payment_method: None,
        },
        None,
        fixed_now(),
    )
    .await
}
