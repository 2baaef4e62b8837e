//! Slot limits - windows that cap concurrent appointments below the salon-wide capacity.

use crate::{
    config::BookingPolicy,
    entities::{SlotLimit, slot_limit},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::info;

use super::{blocked_range::RangeFilter, clean_text, settings, whole_seconds};

/// Request to create a capacity override window.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlotLimit {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_concurrent: i32,
    pub reason: Option<String>,
}

/// Returns every slot limit overlapping `[start, end)`, ordered by start.
pub async fn find_overlapping<C>(
    db: &C,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<slot_limit::Model>>
where
    C: ConnectionTrait,
{
    SlotLimit::find()
        .filter(slot_limit::Column::StartsAt.lt(end))
        .filter(slot_limit::Column::EndsAt.gt(start))
        .order_by_asc(slot_limit::Column::StartsAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a capacity override window.
///
/// # Errors
/// Returns an error if:
/// - `ends_at` is not after `starts_at`
/// - `max_concurrent` is below 1
/// - The database operation fails
pub async fn create_slot_limit(
    db: &DatabaseConnection,
    policy: &BookingPolicy,
    request: NewSlotLimit,
    now: DateTime<Utc>,
) -> Result<slot_limit::Model> {
    let starts_at = whole_seconds(request.starts_at);
    let ends_at = whole_seconds(request.ends_at);
    if ends_at <= starts_at {
        return Err(Error::validation("Slot limit must end after it starts"));
    }
    if request.max_concurrent < 1 {
        return Err(Error::validation("maxConcurrent must be at least 1"));
    }

    let txn = db.begin().await?;
    let current = settings::acquire_booking_lock(&txn, policy, now).await?;

    let created = slot_limit::ActiveModel {
        settings_id: Set(current.id),
        starts_at: Set(starts_at),
        ends_at: Set(ends_at),
        max_concurrent: Set(request.max_concurrent),
        reason: Set(clean_text(request.reason)),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(id = created.id, max_concurrent = created.max_concurrent, "Slot limit created");
    Ok(created)
}

pub async fn delete_slot_limit(db: &DatabaseConnection, id: i64) -> Result<()> {
    let result = SlotLimit::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Slot limit", id));
    }
    Ok(())
}

pub async fn list_slot_limits(
    db: &DatabaseConnection,
    filter: RangeFilter,
) -> Result<Vec<slot_limit::Model>> {
    let mut query = SlotLimit::find();
    if let Some(from) = filter.from {
        query = query.filter(slot_limit::Column::EndsAt.gt(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(slot_limit::Column::StartsAt.lt(to));
    }

    query
        .order_by_asc(slot_limit::Column::StartsAt)
        .all(db)
        .await
        .map_err(Into::into)
}
