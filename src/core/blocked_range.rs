//! Blocked-range registry - salon-wide blackout windows.
//!
//! Overlap uses the half-open test `range.start < end AND range.end > start`, so ranges that
//! merely touch do not overlap. Ranges are never updated, only created and deleted.

use crate::{
    config::BookingPolicy,
    entities::{BlockedRange, blocked_range},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{clean_text, settings, whole_seconds};

/// Request to create a blackout window.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockedRange {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Optional window filter for listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RangeFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Returns every blocked range overlapping `[start, end)`, ordered by start.
pub async fn find_overlapping<C>(
    db: &C,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<blocked_range::Model>>
where
    C: ConnectionTrait,
{
    BlockedRange::find()
        .filter(blocked_range::Column::StartsAt.lt(end))
        .filter(blocked_range::Column::EndsAt.gt(start))
        .order_by_asc(blocked_range::Column::StartsAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a blackout window.
///
/// The overlap check and insert run under the booking lock, so two admins cannot create
/// overlapping ranges concurrently and a booking cannot slip into a range being created.
///
/// # Errors
/// Returns an error if:
/// - `ends_at` is not after `starts_at`
/// - The window overlaps an existing blocked range
/// - The database operation fails
#[instrument(skip(db, policy))]
pub async fn create_blocked_range(
    db: &DatabaseConnection,
    policy: &BookingPolicy,
    request: NewBlockedRange,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<blocked_range::Model> {
    let starts_at = whole_seconds(request.starts_at);
    let ends_at = whole_seconds(request.ends_at);
    if ends_at <= starts_at {
        return Err(Error::validation("Blocked range must end after it starts"));
    }

    let txn = db.begin().await?;
    let current = settings::acquire_booking_lock(&txn, policy, now).await?;

    if let Some(existing) = find_overlapping(&txn, starts_at, ends_at).await?.first() {
        return Err(Error::conflict(format!(
            "Blocked range overlaps an existing range ({} - {})",
            existing.starts_at.to_rfc3339(),
            existing.ends_at.to_rfc3339()
        )));
    }

    let created = blocked_range::ActiveModel {
        settings_id: Set(current.id),
        starts_at: Set(starts_at),
        ends_at: Set(ends_at),
        reason: Set(clean_text(request.reason)),
        created_by_id: Set(actor_id),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(id = created.id, "Blocked range created");
    Ok(created)
}

/// Deletes a blackout window by id.
pub async fn delete_blocked_range(db: &DatabaseConnection, id: i64) -> Result<()> {
    let result = BlockedRange::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Blocked range", id));
    }
    info!(id, "Blocked range deleted");
    Ok(())
}

/// Lists blackout windows, optionally restricted to those overlapping `[from, to)`.
pub async fn list_blocked_ranges(
    db: &DatabaseConnection,
    filter: RangeFilter,
) -> Result<Vec<blocked_range::Model>> {
    let mut query = BlockedRange::find();
    if let Some(from) = filter.from {
        query = query.filter(blocked_range::Column::EndsAt.gt(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(blocked_range::Column::StartsAt.lt(to));
    }

    query
        .order_by_asc(blocked_range::Column::StartsAt)
        .all(db)
        .await
        .map_err(Into::into)
}
