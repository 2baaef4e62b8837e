//! Settings store - the lazily created singleton holding booking capacity and window.
//!
//! Creation is race-safe: the row is inserted with `ON CONFLICT DO NOTHING` and re-read, so a
//! concurrent first access never fails on the duplicate key.

use crate::{
    config::booking::{BOOKING_WINDOW_RANGE, BookingPolicy, MAX_CONCURRENT_RANGE},
    entities::{Settings, settings},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::whole_seconds;

/// Partial settings update; only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub max_concurrent_appointments: Option<i32>,
    pub booking_window_days: Option<i32>,
}

/// Inserts the singleton with the policy defaults unless it already exists.
async fn insert_defaults<C>(db: &C, policy: &BookingPolicy, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let defaults = settings::ActiveModel {
        id: Set(settings::SETTINGS_ID),
        max_concurrent_appointments: Set(policy.default_max_concurrent),
        booking_window_days: Set(policy.default_booking_window_days),
        booking_revision: Set(0),
        updated_at: Set(whole_seconds(now)),
    };

    let inserted = Settings::insert(defaults)
        .on_conflict(
            OnConflict::column(settings::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted > 0 {
        info!(
            max_concurrent = policy.default_max_concurrent,
            window_days = policy.default_booking_window_days,
            "Created default settings"
        );
    }
    Ok(())
}

async fn fetch<C>(db: &C) -> Result<settings::Model>
where
    C: ConnectionTrait,
{
    Settings::find_by_id(settings::SETTINGS_ID)
        .one(db)
        .await?
        .ok_or_else(|| Error::Internal {
            message: "Settings row vanished after creation".to_string(),
        })
}

/// Reads the settings singleton, creating it with the policy defaults if absent.
pub async fn get_or_create<C>(db: &C, policy: &BookingPolicy, now: DateTime<Utc>) -> Result<settings::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = Settings::find_by_id(settings::SETTINGS_ID).one(db).await? {
        return Ok(existing);
    }

    insert_defaults(db, policy, now).await?;
    fetch(db).await
}

/// Takes the database write lock inside the transaction `txn`.
///
/// `SQLite` transactions begin deferred. One that reads first and writes later cannot upgrade
/// its lock while another connection is writing, and fails with `SQLITE_BUSY` instead of
/// waiting. Opening with this write (`booking_revision + 1`) makes the transaction wait on
/// the busy timeout for the lock, and every later read sees committed state.
pub async fn acquire_write_lock<C>(txn: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    Settings::update_many()
        .col_expr(
            settings::Column::BookingRevision,
            Expr::col(settings::Column::BookingRevision).add(1),
        )
        .filter(settings::Column::Id.eq(settings::SETTINGS_ID))
        .exec(txn)
        .await?;
    Ok(())
}

/// Takes the booking lock inside the transaction `txn` and returns the current settings.
///
/// The first statements are writes to the settings row, so the transaction holds the write
/// lock before it reads any capacity state. Concurrent bookings queue on this row until the
/// holder commits or rolls back.
#[instrument(skip(txn, policy))]
pub async fn acquire_booking_lock<C>(
    txn: &C,
    policy: &BookingPolicy,
    now: DateTime<Utc>,
) -> Result<settings::Model>
where
    C: ConnectionTrait,
{
    insert_defaults(txn, policy, now).await?;
    acquire_write_lock(txn).await?;

    let current = fetch(txn).await?;
    debug!(revision = current.booking_revision, "Acquired booking lock");
    Ok(current)
}

/// Applies a partial update to the settings.
///
/// # Errors
/// Returns an error if:
/// - No field is supplied
/// - A value is outside its allowed range
/// - The database update fails
pub async fn update_settings(
    db: &DatabaseConnection,
    policy: &BookingPolicy,
    update: SettingsUpdate,
    now: DateTime<Utc>,
) -> Result<settings::Model> {
    if update.max_concurrent_appointments.is_none() && update.booking_window_days.is_none() {
        return Err(Error::validation("At least one setting must be provided"));
    }

    if let Some(max) = update.max_concurrent_appointments {
        if !MAX_CONCURRENT_RANGE.contains(&max) {
            return Err(Error::validation(format!(
                "maxConcurrentAppointments must be between {} and {}",
                MAX_CONCURRENT_RANGE.start(),
                MAX_CONCURRENT_RANGE.end()
            )));
        }
    }

    if let Some(days) = update.booking_window_days {
        if !BOOKING_WINDOW_RANGE.contains(&days) {
            return Err(Error::validation(format!(
                "bookingWindowDays must be between {} and {}",
                BOOKING_WINDOW_RANGE.start(),
                BOOKING_WINDOW_RANGE.end()
            )));
        }
    }

    let mut active: settings::ActiveModel = get_or_create(db, policy, now).await?.into();
    if let Some(max) = update.max_concurrent_appointments {
        active.max_concurrent_appointments = Set(max);
    }
    if let Some(days) = update.booking_window_days {
        active.booking_window_days = Set(days);
    }
    active.updated_at = Set(whole_seconds(now));

    let updated = active.update(db).await?;
    info!(
        max_concurrent = updated.max_concurrent_appointments,
        window_days = updated.booking_window_days,
        "Settings updated"
    );
    Ok(updated)
}
