//! Appointment queries and the status transition engine.
//!
//! A status change runs in one transaction that takes the write lock before reading the
//! appointment, then does a compare-and-set write of the new status, the
//! inventory settlement when the target is `COMPLETED`, then one audit event. Any failure,
//! including a single item with insufficient stock, rolls the whole change back.

use crate::{
    entities::{
        Appointment, AppointmentEvent, AppointmentStatus, Inventory, InventoryAdjustment, Payment,
        Role, Service, User, appointment, appointment_event, inventory, inventory_adjustment, payment,
        service, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{
    clean_text,
    inventory::{LowStockWarning, get_inventory_item, is_low_stock},
    service::load_requirements,
    settings::acquire_write_lock,
    whole_seconds,
};

/// An appointment with everything it owns or references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: appointment::Model,
    pub service: service::Model,
    pub customer: Option<user::Model>,
    pub payment: Option<payment::Model>,
    pub events: Vec<appointment_event::Model>,
    pub adjustments: Vec<inventory_adjustment::Model>,
}

/// Row of the staff appointment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListItem {
    #[serde(flatten)]
    pub appointment: appointment::Model,
    pub service: Option<service::Model>,
}

/// Optional filters for listing appointments.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    /// Inclusive lower bound on the start
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the start
    pub to: Option<DateTime<Utc>>,
}

/// Inventory effects of a status change; empty unless the target was `COMPLETED`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub adjustments: Vec<inventory_adjustment::Model>,
    pub low_stock: Vec<LowStockWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateOutcome {
    pub appointment: AppointmentDetails,
    pub inventory: Settlement,
}

/// Loads an appointment with its service, customer, payment, events and adjustments.
pub async fn get_appointment_details<C>(db: &C, id: i64) -> Result<AppointmentDetails>
where
    C: ConnectionTrait,
{
    let appointment = Appointment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Appointment", id))?;

    let service = Service::find_by_id(appointment.service_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Service", appointment.service_id))?;

    let customer = match appointment.customer_id {
        Some(customer_id) => User::find_by_id(customer_id).one(db).await?,
        None => None,
    };

    let payment = Payment::find()
        .filter(payment::Column::AppointmentId.eq(id))
        .one(db)
        .await?;

    let events = AppointmentEvent::find()
        .filter(appointment_event::Column::AppointmentId.eq(id))
        .order_by_asc(appointment_event::Column::Id)
        .all(db)
        .await?;

    let adjustments = InventoryAdjustment::find()
        .filter(inventory_adjustment::Column::AppointmentId.eq(id))
        .order_by_asc(inventory_adjustment::Column::Id)
        .all(db)
        .await?;

    Ok(AppointmentDetails {
        appointment,
        service,
        customer,
        payment,
        events,
        adjustments,
    })
}

/// Lists appointments by start time, each with its service.
pub async fn list_appointments(
    db: &DatabaseConnection,
    filter: AppointmentFilter,
) -> Result<Vec<AppointmentListItem>> {
    let mut query = Appointment::find();
    if let Some(status) = filter.status {
        query = query.filter(appointment::Column::Status.eq(status));
    }
    if let Some(from) = filter.from {
        query = query.filter(appointment::Column::ScheduledStart.gte(whole_seconds(from)));
    }
    if let Some(to) = filter.to {
        query = query.filter(appointment::Column::ScheduledStart.lt(whole_seconds(to)));
    }

    let rows = query
        .find_also_related(Service)
        .order_by_asc(appointment::Column::ScheduledStart)
        .order_by_asc(appointment::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(appointment, service)| AppointmentListItem {
            appointment,
            service,
        })
        .collect())
}

/// Appends one audit event to an appointment.
pub(crate) async fn record_event<C>(
    db: &C,
    appointment_id: i64,
    status: AppointmentStatus,
    notes: Option<String>,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<appointment_event::Model>
where
    C: ConnectionTrait,
{
    appointment_event::ActiveModel {
        appointment_id: Set(appointment_id),
        status: Set(status),
        notes: Set(notes),
        created_by_id: Set(actor_id),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Writes `target` only if the stored status still equals the one in `current`.
///
/// # Errors
/// Returns a conflict if another writer changed the status first.
pub(crate) async fn write_status<C>(
    db: &C,
    current: &appointment::Model,
    target: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Appointment::update_many()
        .set(appointment::ActiveModel {
            status: Set(target),
            updated_at: Set(whole_seconds(now)),
            ..Default::default()
        })
        .filter(appointment::Column::Id.eq(current.id))
        .filter(appointment::Column::Status.eq(current.status))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::conflict("Appointment was modified concurrently"));
    }
    Ok(())
}

/// Consumes the service requirements of a completing appointment.
///
/// Each decrement is conditional on enough stock being left, so concurrent completions
/// sharing an item can never drive it negative.
async fn settle_inventory<C>(
    db: &C,
    appointment: &appointment::Model,
    now: DateTime<Utc>,
) -> Result<Settlement>
where
    C: ConnectionTrait,
{
    let mut settlement = Settlement::default();

    for (requirement, item) in load_requirements(db, appointment.service_id).await? {
        let result = Inventory::update_many()
            .col_expr(
                inventory::Column::Stock,
                Expr::col(inventory::Column::Stock).sub(requirement.quantity),
            )
            .filter(inventory::Column::Id.eq(item.id))
            .filter(inventory::Column::Stock.gte(requirement.quantity))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            let available = get_inventory_item(db, item.id).await?.stock;
            return Err(Error::InsufficientStock {
                item: item.name,
                available,
                required: requirement.quantity,
            });
        }

        let adjustment = inventory_adjustment::ActiveModel {
            appointment_id: Set(Some(appointment.id)),
            inventory_id: Set(item.id),
            change: Set(-requirement.quantity),
            reason: Set(inventory_adjustment::REASON_APPOINTMENT_COMPLETED.to_string()),
            created_at: Set(whole_seconds(now)),
            ..Default::default()
        }
        .insert(db)
        .await?;
        settlement.adjustments.push(adjustment);

        let updated = get_inventory_item(db, item.id).await?;
        if is_low_stock(&updated) {
            settlement.low_stock.push(LowStockWarning::from(&updated));
        }
    }

    Ok(settlement)
}

/// Moves an appointment to `target`.
///
/// A request for the current status is a no-op that logs nothing. Terminal appointments
/// refuse every other target. Completing settles inventory in the same transaction.
///
/// # Errors
/// Returns an error if:
/// - The appointment does not exist
/// - The appointment is already completed or cancelled
/// - Completion finds an item with insufficient stock
/// - The status was changed concurrently
/// - The database operation fails
#[instrument(skip(db, notes))]
pub async fn update_status(
    db: &DatabaseConnection,
    id: i64,
    target: AppointmentStatus,
    notes: Option<String>,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<StatusUpdateOutcome> {
    let txn = db.begin().await?;
    acquire_write_lock(&txn).await?;

    let current = Appointment::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Appointment", id))?;

    if current.status == target {
        let appointment = get_appointment_details(&txn, id).await?;
        txn.commit().await?;
        return Ok(StatusUpdateOutcome {
            appointment,
            inventory: Settlement::default(),
        });
    }

    if !current.status.can_transition_to(target) {
        return Err(Error::validation("Cannot modify a finalized appointment"));
    }

    write_status(&txn, &current, target, now).await?;

    let settlement = if target == AppointmentStatus::Completed {
        settle_inventory(&txn, &current, now).await?
    } else {
        Settlement::default()
    };

    record_event(&txn, id, target, clean_text(notes), actor_id, now).await?;
    let appointment = get_appointment_details(&txn, id).await?;
    txn.commit().await?;

    info!(id, from = ?current.status, to = ?target, "Appointment status changed");
    if !settlement.adjustments.is_empty() {
        info!(id, items = settlement.adjustments.len(), "Inventory settled");
    }
    for item in &settlement.low_stock {
        warn!(
            inventory_id = item.inventory_id,
            name = %item.name,
            stock = item.stock,
            threshold = item.threshold,
            "Inventory low on stock"
        );
    }

    Ok(StatusUpdateOutcome {
        appointment,
        inventory: settlement,
    })
}

/// Cancels an appointment on behalf of `actor_id`.
///
/// Customers may only cancel appointments linked to their own account; staff and admins
/// may cancel any.
///
/// # Errors
/// Returns an error if the appointment is missing, belongs to another customer, or cannot
/// be cancelled.
pub async fn cancel_appointment(
    db: &DatabaseConnection,
    id: i64,
    actor_id: i64,
    role: Role,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<StatusUpdateOutcome> {
    if !role.is_staff() {
        let appointment = Appointment::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("Appointment", id))?;
        if appointment.customer_id != Some(actor_id) {
            return Err(Error::forbidden("You can only cancel your own appointments"));
        }
    }

    let notes = clean_text(notes).or_else(|| Some("Appointment cancelled".to_string()));
    update_status(db, id, AppointmentStatus::Cancelled, notes, Some(actor_id), now).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    async fn completing_setup(
        db: &DatabaseConnection,
        stock: i64,
        quantity: i64,
    ) -> Result<(i64, i64)> {
        let dye = create_test_inventory(db, "Hair Dye", stock, 2).await?;
        let color =
            create_service_with_requirements(db, "Hair Color", 90, vec![(dye.id, quantity)]).await?;
        let booked =
            book_test_appointment(db, color.id, test_day_at(10, 0), "ana@example.com").await?;
        Ok((booked.appointment.appointment.id, dye.id))
    }

    #[tokio::test]
    async fn test_transition_logs_one_event() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let booked = book_test_appointment(&db, service.id, test_day_at(9, 0), "a@example.com").await?;
        let id = booked.appointment.appointment.id;

        let outcome = update_status(
            &db,
            id,
            AppointmentStatus::Confirmed,
            Some("Called ahead".to_string()),
            Some(7),
            fixed_now(),
        )
        .await?;

        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(outcome.appointment.events.len(), 2);
        let last = outcome.appointment.events.last().unwrap();
        assert_eq!(last.status, AppointmentStatus::Confirmed);
        assert_eq!(last.notes.as_deref(), Some("Called ahead"));
        assert_eq!(last.created_by_id, Some(7));
        assert_eq!(outcome.inventory, Settlement::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_same_status_is_a_no_op() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let booked = book_test_appointment(&db, service.id, test_day_at(9, 0), "a@example.com").await?;
        let id = booked.appointment.appointment.id;

        let outcome =
            update_status(&db, id, AppointmentStatus::Pending, None, Some(1), fixed_now()).await?;
        assert_eq!(outcome.appointment, booked.appointment);
        assert_eq!(outcome.appointment.events.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_terminal_statuses_are_final() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let first = book_test_appointment(&db, service.id, test_day_at(9, 0), "a@example.com").await?;
        let second = book_test_appointment(&db, service.id, test_day_at(11, 0), "b@example.com").await?;
        let completed = first.appointment.appointment.id;
        let cancelled = second.appointment.appointment.id;

        update_status(&db, completed, AppointmentStatus::Completed, None, None, fixed_now()).await?;
        update_status(&db, cancelled, AppointmentStatus::Cancelled, None, None, fixed_now()).await?;

        for id in [completed, cancelled] {
            for target in [
                AppointmentStatus::Pending,
                AppointmentStatus::Confirmed,
                AppointmentStatus::InProgress,
            ] {
                let result = update_status(&db, id, target, None, None, fixed_now()).await;
                assert!(matches!(result, Err(Error::Validation { .. })));
            }
        }
        let result =
            update_status(&db, completed, AppointmentStatus::Cancelled, None, None, fixed_now()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Same terminal status short-circuits instead of failing
        let again =
            update_status(&db, completed, AppointmentStatus::Completed, None, None, fixed_now()).await?;
        assert_eq!(again.appointment.events.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_appointment() -> Result<()> {
        let db = setup_test_db().await?;
        let result =
            update_status(&db, 42, AppointmentStatus::Confirmed, None, None, fixed_now()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_completion() -> Result<()> {
        let db = setup_test_db().await?;
        let (id, dye_id) = completing_setup(&db, 3, 5).await?;
        update_status(&db, id, AppointmentStatus::InProgress, None, None, fixed_now()).await?;

        let result =
            update_status(&db, id, AppointmentStatus::Completed, None, None, fixed_now()).await;
        match result {
            Err(Error::InsufficientStock {
                item,
                available,
                required,
            }) => {
                assert_eq!(item, "Hair Dye");
                assert_eq!(available, 3);
                assert_eq!(required, 5);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        let details = get_appointment_details(&db, id).await?;
        assert_eq!(details.appointment.status, AppointmentStatus::InProgress);
        assert_eq!(details.events.len(), 2);
        assert!(details.adjustments.is_empty());
        assert_eq!(Inventory::find_by_id(dye_id).one(&db).await?.unwrap().stock, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_completion_settles_inventory() -> Result<()> {
        let db = setup_test_db().await?;
        let (id, dye_id) = completing_setup(&db, 6, 4).await?;

        let outcome =
            update_status(&db, id, AppointmentStatus::Completed, None, Some(3), fixed_now()).await?;

        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Completed);
        assert_eq!(outcome.inventory.adjustments.len(), 1);
        let adjustment = &outcome.inventory.adjustments[0];
        assert_eq!(adjustment.change, -4);
        assert_eq!(adjustment.inventory_id, dye_id);
        assert_eq!(adjustment.reason, "APPOINTMENT_COMPLETED");
        assert_eq!(outcome.appointment.adjustments, outcome.inventory.adjustments);

        // 2 left against a threshold of 2
        assert_eq!(outcome.inventory.low_stock.len(), 1);
        assert_eq!(outcome.inventory.low_stock[0].stock, 2);
        assert_eq!(Inventory::find_by_id(dye_id).one(&db).await?.unwrap().stock, 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_never_oversell() -> Result<()> {
        let (db, _dir) = setup_shared_test_db(8).await?;
        let dye = create_test_inventory(&db, "Hair Dye", 5, 1).await?;
        let color =
            create_service_with_requirements(&db, "Hair Color", 90, vec![(dye.id, 5)]).await?;

        let mut ids = Vec::new();
        for i in 0..6 {
            let booked = book_test_appointment(
                &db,
                color.id,
                test_day_at(9 + 2 * i, 0),
                &format!("guest{i}@example.com"),
            )
            .await?;
            ids.push(booked.appointment.appointment.id);
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let db = db.clone();
                tokio::spawn(async move {
                    update_status(&db, id, AppointmentStatus::Completed, None, None, fixed_now())
                        .await
                })
            })
            .collect();

        let mut completed = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => completed += 1,
                Err(Error::InsufficientStock {
                    available,
                    required,
                    ..
                }) => {
                    assert_eq!((available, required), (0, 5));
                    short += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(completed, 1);
        assert_eq!(short, 5);
        assert_eq!(get_inventory_item(&db, dye.id).await?.stock, 0);
        assert_eq!(InventoryAdjustment::find().all(&db).await?.len(), 1);
        let still_pending = Appointment::find()
            .filter(appointment::Column::Status.eq(AppointmentStatus::Pending))
            .all(&db)
            .await?;
        assert_eq!(still_pending.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_status_write_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let booked = book_test_appointment(&db, service.id, test_day_at(9, 0), "a@example.com").await?;
        let stale = booked.appointment.appointment;

        update_status(&db, stale.id, AppointmentStatus::Confirmed, None, None, fixed_now()).await?;

        let result = write_status(&db, &stale, AppointmentStatus::InProgress, fixed_now()).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_customer_cancels_only_own() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let booked = book_test_appointment(&db, service.id, test_day_at(9, 0), "a@example.com").await?;
        let id = booked.appointment.appointment.id;
        let owner = booked.appointment.appointment.customer_id.unwrap();

        let result = cancel_appointment(&db, id, owner + 100, Role::Customer, None, fixed_now()).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let outcome = cancel_appointment(&db, id, owner, Role::Customer, None, fixed_now()).await?;
        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Cancelled);
        let last = outcome.appointment.events.last().unwrap();
        assert_eq!(last.created_by_id, Some(owner));
        assert_eq!(last.notes.as_deref(), Some("Appointment cancelled"));
        Ok(())
    }

    #[tokio::test]
    async fn test_staff_cancels_any() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let booked = book_test_appointment(&db, service.id, test_day_at(9, 0), "a@example.com").await?;

        let outcome = cancel_appointment(
            &db,
            booked.appointment.appointment.id,
            900,
            Role::Staff,
            Some("Stylist sick".to_string()),
            fixed_now(),
        )
        .await?;
        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Cancelled);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_and_order() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Haircut", 60).await?;
        let late = book_test_appointment(&db, service.id, test_day_at(15, 0), "a@example.com").await?;
        book_test_appointment(&db, service.id, test_day_at(9, 0), "b@example.com").await?;
        update_status(
            &db,
            late.appointment.appointment.id,
            AppointmentStatus::Confirmed,
            None,
            None,
            fixed_now(),
        )
        .await?;

        let all = list_appointments(&db, AppointmentFilter::default()).await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].appointment.scheduled_start, test_day_at(9, 0));
        assert_eq!(all[0].service.as_ref().unwrap().name, "Haircut");

        let confirmed = list_appointments(
            &db,
            AppointmentFilter {
                status: Some(AppointmentStatus::Confirmed),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(confirmed.len(), 1);

        let morning = list_appointments(
            &db,
            AppointmentFilter {
                status: None,
                from: Some(test_day_at(9, 0)),
                to: Some(test_day_at(15, 0)),
            },
        )
        .await?;
        assert_eq!(morning.len(), 1);
        assert_eq!(morning[0].appointment.scheduled_start, test_day_at(9, 0));
        Ok(())
    }
}
